//! User model
//!
//! Back-office accounts. A superadmin manages everything including settings
//! and subscribers; editors manage content only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Back-office user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub display_name: Option<String>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The password must already be hashed, see `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            password_hash,
            role,
            status: UserStatus::Active,
            display_name: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_superadmin(&self) -> bool {
        self.role == UserRole::SuperAdmin
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Name to show in the dashboard
    pub fn display(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    SuperAdmin,
    #[default]
    Editor,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::SuperAdmin => write!(f, "superadmin"),
            UserRole::Editor => write!(f, "editor"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "superadmin" | "admin" => Ok(UserRole::SuperAdmin),
            "editor" => Ok(UserRole::Editor),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Disabled,
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserStatus::Active => write!(f, "active"),
            UserStatus::Disabled => write!(f, "disabled"),
        }
    }
}

impl FromStr for UserStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(UserStatus::Active),
            "disabled" | "banned" => Ok(UserStatus::Disabled),
            _ => Err(anyhow::anyhow!("Invalid user status: {}", s)),
        }
    }
}

/// Input for creating a user (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    /// Plaintext, hashed by the service
    pub password: String,
    pub role: Option<UserRole>,
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new() {
        let user = User::new(
            "owner".to_string(),
            "owner@example.com".to_string(),
            "hash".to_string(),
            UserRole::SuperAdmin,
        );

        assert_eq!(user.id, 0);
        assert!(user.is_superadmin());
        assert!(user.is_active());
        assert_eq!(user.display(), "owner");
    }

    #[test]
    fn test_display_name_fallback() {
        let mut user = User::new("ed".into(), "ed@example.com".into(), "hash".into(), UserRole::Editor);
        user.display_name = Some("  ".into());
        assert_eq!(user.display(), "ed");
        user.display_name = Some("Ed Itor".into());
        assert_eq!(user.display(), "Ed Itor");
    }

    #[test]
    fn test_role_roundtrip() {
        assert_eq!(UserRole::SuperAdmin.to_string(), "superadmin");
        assert_eq!(UserRole::from_str("SUPERADMIN").unwrap(), UserRole::SuperAdmin);
        assert_eq!(UserRole::from_str("admin").unwrap(), UserRole::SuperAdmin);
        assert_eq!(UserRole::from_str("editor").unwrap(), UserRole::Editor);
        assert!(UserRole::from_str("author").is_err());
        assert_eq!(UserRole::default(), UserRole::Editor);
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("a".into(), "a@b.c".into(), "secret".into(), UserRole::Editor);
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"role\":\"editor\""));
    }
}
