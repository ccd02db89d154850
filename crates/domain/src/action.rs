use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use modgate_core::AppError;
use serde::{Deserialize, Serialize};

/// Capability that can be granted on a module.
///
/// Actions are independent: granting `manage` does not imply `view` or
/// `edit`. Each one must be granted explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Read access to the module.
    View,
    /// Modify data owned by the module.
    Edit,
    /// Administer module configuration.
    Manage,
    /// Switch the module off for the organization.
    Disable,
}

/// Ordered set of actions.
pub type ActionSet = BTreeSet<Action>;

impl Action {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Edit => "edit",
            Self::Manage => "manage",
            Self::Disable => "disable",
        }
    }

    /// Returns all known actions in canonical order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Action] = &[Action::View, Action::Edit, Action::Manage, Action::Disable];

        ALL
    }

    /// Parses a transport value into an action.
    pub fn from_transport(value: &str) -> Result<Self, AppError> {
        Self::from_str(value)
    }
}

impl Display for Action {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "view" => Ok(Self::View),
            "edit" => Ok(Self::Edit),
            "manage" => Ok(Self::Manage),
            "disable" => Ok(Self::Disable),
            _ => Err(AppError::Validation(format!(
                "unknown action value '{value}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::Action;

    #[test]
    fn action_roundtrip_storage_value() {
        for action in Action::all() {
            let restored = Action::from_str(action.as_str());
            assert_eq!(restored.ok(), Some(*action));
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(Action::from_transport("delete").is_err());
        assert!(Action::from_transport("View").is_err());
    }
}
