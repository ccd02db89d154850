use std::borrow::Borrow;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{AppResult, NonEmptyString};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(NonEmptyString);

        impl $name {
            /// Creates a validated identifier.
            pub fn new(value: impl Into<String>) -> AppResult<Self> {
                Ok(Self(NonEmptyString::new(value)?))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl Display for $name {
            fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                formatter.write_str(self.0.as_str())
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0.into()
            }
        }
    };
}

string_id!(
    /// Stable identifier of a feature module, e.g. `crm`.
    ModuleId
);

string_id!(
    /// Stable identifier of a subscription plan, e.g. `pro`.
    PlanId
);

string_id!(
    /// Stable identifier of an organization-defined role.
    RoleId
);

string_id!(
    /// Stable identifier of a tenant organization.
    OrganizationId
);

string_id!(
    /// Stable identifier of a user.
    UserId
);
