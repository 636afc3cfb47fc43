//! User model
//!
//! Accounts start inactive until the emailed activation link is followed
//! (social sign-ups are active immediately). Staff users may moderate
//! reports and comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity representing a registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Whether the account has been activated
    pub is_active: bool,
    /// Moderators can see and manage every report
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, inactive, non-staff user.
    ///
    /// The password must already be hashed with `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by the database
            username,
            email,
            password_hash,
            is_active: false,
            is_staff: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the user as active
    pub fn activated(mut self) -> Self {
        self.is_active = true;
        self
    }

    /// Whether this user may manage a resource owned by `owner_id`
    pub fn can_manage(&self, owner_id: i64) -> bool {
        self.is_staff || self.id == owner_id
    }
}

/// Changes to the account itself (profile fields live in `UpdateProfileInput`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UpdateUserInput {
    pub fn has_changes(&self) -> bool {
        self.username.is_some() || self.email.is_some() || self.password.is_some()
    }
}

/// A stored password reset token
#[derive(Debug, Clone)]
pub struct PasswordResetToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_inactive() {
        let user = User::new("amina".into(), "amina@example.com".into(), "hash".into());
        assert_eq!(user.id, 0);
        assert!(!user.is_active);
        assert!(!user.is_staff);
        assert!(user.activated().is_active);
    }

    #[test]
    fn test_can_manage() {
        let mut user = User::new("amina".into(), "amina@example.com".into(), "hash".into());
        user.id = 7;
        assert!(user.can_manage(7));
        assert!(!user.can_manage(8));

        user.is_staff = true;
        assert!(user.can_manage(8));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("amina".into(), "amina@example.com".into(), "secret-hash".into());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("password_hash"));
    }
}
