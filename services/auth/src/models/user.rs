//! User model and related payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Account role, stored as lowercase text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// User entity
///
/// `session_id` identifies the currently-valid refresh-token lineage:
/// a refresh token is only honored while the identifier it embeds
/// matches this column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Absent for externally-authenticated accounts
    pub hashed_password: Option<String>,
    /// Becomes true at the first successful code verification
    pub is_active: bool,
    pub role: Role,
    pub two_fa_enabled: bool,
    pub two_fa_code: Option<String>,
    /// Unix seconds; the code is invalid once current time passes this
    pub two_fa_code_expiry: Option<i64>,
    pub session_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub hashed_password: Option<String>,
    pub role: Role,
    pub two_fa_enabled: bool,
}

/// Partial user update
///
/// `two_fa_code`, `two_fa_code_expiry` and `session_id` use a nested
/// `Option` so that clearing the column (`Some(None)`) is distinct from
/// leaving it unchanged (`None`).
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub hashed_password: Option<String>,
    pub is_active: Option<bool>,
    pub two_fa_code: Option<Option<String>>,
    pub two_fa_code_expiry: Option<Option<i64>>,
    pub session_id: Option<Option<Uuid>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn update_user_default_changes_nothing() {
        let update = UpdateUser::default();
        assert!(update.hashed_password.is_none());
        assert!(update.is_active.is_none());
        assert!(update.two_fa_code.is_none());
        assert!(update.session_id.is_none());
    }
}
