use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Actor role of an authenticated principal.
///
/// Anything the identity service sends that is not one of the three known
/// roles deserializes to `Unknown`, which every authorization decision
/// treats as unauthenticated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Role {
    Admin,
    Business,
    Customer,
    Unknown,
}

impl Role {
    /// The roles a principal can actually hold.
    pub const KNOWN: [Role; 3] = [Role::Admin, Role::Business, Role::Customer];

    pub fn is_known(&self) -> bool {
        !matches!(self, Role::Unknown)
    }

    /// Parse a role name as sent by the identity service; anything
    /// unrecognised is `Unknown`.
    pub fn from_wire(value: &str) -> Self {
        value.trim().parse().unwrap_or(Role::Unknown)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from_wire(&value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_ref().to_string()
    }
}
