use serde::{Deserialize, Serialize};

/// Role identifier used for the portal's hierarchical RBAC.
///
/// The known roles form a total order `user < admin < super`. Role strings read
/// from storage that are not one of those are preserved as [`Role::Unknown`] so
/// they can be logged, but they never satisfy any requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    User,
    Admin,
    Super,
    Unknown(String),
}

impl Role {
    /// Parse a role name (case-sensitive, as stored).
    pub fn parse(name: &str) -> Self {
        match name {
            "user" => Role::User,
            "admin" => Role::Admin,
            "super" => Role::Super,
            other => Role::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Super => "super",
            Role::Unknown(raw) => raw,
        }
    }

    /// Position in the hierarchy; `None` for unrecognized roles.
    pub fn level(&self) -> Option<u8> {
        match self {
            Role::User => Some(1),
            Role::Admin => Some(2),
            Role::Super => Some(3),
            Role::Unknown(_) => None,
        }
    }
}

/// Hierarchy check: fails closed when either side is unrecognized.
pub fn has_minimum_role(current: &Role, minimum: &Role) -> bool {
    match (current.level(), minimum.level()) {
        (Some(current), Some(required)) => current >= required,
        _ => false,
    }
}

/// String form of [`has_minimum_role`] for raw values (query params, legacy data).
pub fn has_minimum_role_str(current: &str, minimum: &str) -> bool {
    has_minimum_role(&Role::parse(current), &Role::parse(minimum))
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::parse(&value)
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::parse(value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        match value {
            Role::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
