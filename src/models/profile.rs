//! Profile model
//!
//! One profile per user, created together with the account.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Public-facing profile of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    /// Joined from `users`
    pub username: String,
    /// Joined from `users`, used for the gravatar fallback
    #[serde(skip_serializing)]
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub bio: String,
    pub avatar: Option<String>,
    pub city: String,
    pub country: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    /// Receive in-app notifications when followed authors publish
    pub app_notification_enabled: bool,
    /// Receive the periodic notification email
    pub email_notification_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// The configured avatar, or a gravatar derived from the email.
    pub fn avatar_url(&self) -> String {
        match &self.avatar {
            Some(url) if !url.is_empty() => url.clone(),
            _ => gravatar_url(&self.email),
        }
    }
}

/// Gravatar URL for an email address
pub fn gravatar_url(email: &str) -> String {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return "https://www.gravatar.com/avatar/?d=mp&s=120".to_string();
    }
    let hash = format!("{:x}", md5::compute(email));
    format!("https://www.gravatar.com/avatar/{}?d=identicon&s=120", hash)
}

/// Partial profile update; `None` leaves the field untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProfileInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
}

impl UpdateProfileInput {
    /// Check if any field is set
    pub fn has_changes(&self) -> bool {
        self.first_name.is_some()
            || self.last_name.is_some()
            || self.birth_date.is_some()
            || self.bio.is_some()
            || self.avatar.is_some()
            || self.city.is_some()
            || self.country.is_some()
            || self.phone.is_some()
            || self.website.is_some()
    }

    /// Apply the set fields onto a profile
    pub fn apply_to(self, profile: &mut Profile) {
        if let Some(v) = self.first_name {
            profile.first_name = v;
        }
        if let Some(v) = self.last_name {
            profile.last_name = v;
        }
        if let Some(v) = self.birth_date {
            profile.birth_date = Some(v);
        }
        if let Some(v) = self.bio {
            profile.bio = v;
        }
        if let Some(v) = self.avatar {
            profile.avatar = Some(v);
        }
        if let Some(v) = self.city {
            profile.city = v;
        }
        if let Some(v) = self.country {
            profile.country = v;
        }
        if let Some(v) = self.phone {
            profile.phone = Some(v);
        }
        if let Some(v) = self.website {
            profile.website = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> Profile {
        let now = Utc::now();
        Profile {
            id: 1,
            user_id: 1,
            username: "amina".into(),
            email: "Amina@Example.com ".into(),
            first_name: String::new(),
            last_name: String::new(),
            birth_date: None,
            bio: String::new(),
            avatar: None,
            city: String::new(),
            country: String::new(),
            phone: None,
            website: None,
            app_notification_enabled: true,
            email_notification_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_gravatar_normalizes_email() {
        assert_eq!(gravatar_url("Amina@Example.com "), gravatar_url("amina@example.com"));
        assert!(gravatar_url("amina@example.com").starts_with("https://www.gravatar.com/avatar/"));
    }

    #[test]
    fn test_avatar_url_prefers_explicit_avatar() {
        let mut profile = sample_profile();
        assert_eq!(profile.avatar_url(), gravatar_url("amina@example.com"));

        profile.avatar = Some("https://cdn.example.com/me.png".into());
        assert_eq!(profile.avatar_url(), "https://cdn.example.com/me.png");
    }

    #[test]
    fn test_apply_partial_update() {
        let mut profile = sample_profile();
        let input = UpdateProfileInput {
            bio: Some("Writer".into()),
            city: Some("Nairobi".into()),
            ..Default::default()
        };
        assert!(input.has_changes());

        input.apply_to(&mut profile);
        assert_eq!(profile.bio, "Writer");
        assert_eq!(profile.city, "Nairobi");
        assert_eq!(profile.country, "");
    }
}
