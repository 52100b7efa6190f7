//! User model
//!
//! Only the profile fields needed for authorization are modeled: identity,
//! display name and role. Credentials live outside this service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Name shown next to content
    pub display_name: Option<String>,
    /// User role
    pub role: UserRole,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Check if the user is an administrator
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Check if the user holds one of the given roles
    pub fn has_any_role(&self, allowed: &[UserRole]) -> bool {
        allowed.contains(&self.role)
    }
}

/// User role for authorization.
///
/// - Admin: may manage the filter taxonomy
/// - Editor: may edit all content
/// - Author: may edit own content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Administrator - full access
    Admin,
    /// Editor - can edit all content
    Editor,
    /// Author - can only edit own content
    #[default]
    Author,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::Editor => write!(f, "editor"),
            UserRole::Author => write!(f, "author"),
        }
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "editor" => Ok(UserRole::Editor),
            "author" => Ok(UserRole::Author),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Input for creating a user profile
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    /// Username
    pub username: String,
    /// Display name
    pub display_name: Option<String>,
    /// User role
    pub role: UserRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: 1,
            username: "someone".to_string(),
            display_name: None,
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_admin() {
        assert!(user(UserRole::Admin).is_admin());
        assert!(!user(UserRole::Editor).is_admin());
        assert!(!user(UserRole::Author).is_admin());
    }

    #[test]
    fn test_has_any_role() {
        let editor = user(UserRole::Editor);
        assert!(editor.has_any_role(&[UserRole::Admin, UserRole::Editor]));
        assert!(!editor.has_any_role(&[UserRole::Admin]));
    }

    #[test]
    fn test_user_role_from_str() {
        assert_eq!(UserRole::from_str("admin").unwrap(), UserRole::Admin);
        assert_eq!(UserRole::from_str("ADMIN").unwrap(), UserRole::Admin);
        assert_eq!(UserRole::from_str("Editor").unwrap(), UserRole::Editor);
        assert!(UserRole::from_str("reader").is_err());
        assert_eq!(UserRole::default(), UserRole::Author);
    }
}
