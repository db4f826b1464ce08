//! Registered profile snapshot shared by the kiosk and the auth service
//!
//! The face-match capability returns this shape on a successful match and
//! the session token embeds it verbatim, so field names follow that payload.

use serde::{Deserialize, Serialize};

/// Access level of a registered profile, stored as an ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum Role {
    #[default]
    User,
    Admin,
    SuperAdmin,
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Role::User),
            1 => Ok(Role::Admin),
            2 => Ok(Role::SuperAdmin),
            other => Err(format!("unknown role ordinal: {}", other)),
        }
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        match role {
            Role::User => 0,
            Role::Admin => 1,
            Role::SuperAdmin => 2,
        }
    }
}

/// Profile snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    #[serde(alias = "phone")]
    pub phone_number: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub designation: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(rename = "isAdmin", default)]
    pub role: Role,
}

impl Profile {
    /// Whether the profile may open administrative views
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin | Role::SuperAdmin)
    }
}
