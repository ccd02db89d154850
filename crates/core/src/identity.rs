use serde::{Deserialize, Serialize};

use crate::{AppResult, NonEmptyString};

/// Identity of the administrator performing a mutation.
///
/// Authentication happens outside the engine; this value is only recorded as
/// `performed_by` on audit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    subject: NonEmptyString,
}

impl CallerIdentity {
    /// Creates a caller identity from a non-empty subject claim.
    pub fn new(subject: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            subject: NonEmptyString::new(subject)?,
        })
    }

    /// Returns the stable subject used as `performed_by`.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::CallerIdentity;

    #[test]
    fn caller_identity_requires_subject() {
        assert!(CallerIdentity::new(" ").is_err());
        let caller = CallerIdentity::new("alice").unwrap_or_else(|_| unreachable!());
        assert_eq!(caller.subject(), "alice");
    }
}
