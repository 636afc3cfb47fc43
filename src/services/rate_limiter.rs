//! Rate limiter for login attempts
//!
//! Failed logins are counted per email address; after 5 failures within
//! 15 minutes further attempts are refused until the window slides past.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Failures tolerated within one window
const MAX_FAILED_ATTEMPTS: usize = 5;

/// Sliding window length in minutes
const WINDOW_MINUTES: i64 = 15;

/// Login rate limiter
pub struct LoginRateLimiter {
    /// Failed login attempts by lowercased email
    attempts: Arc<RwLock<HashMap<String, Vec<DateTime<Utc>>>>>,
    max_attempts: usize,
    window: Duration,
}

impl LoginRateLimiter {
    /// Create a rate limiter with the default 5 attempts per 15 minutes
    pub fn new() -> Self {
        Self::with_limits(MAX_FAILED_ATTEMPTS, Duration::minutes(WINDOW_MINUTES))
    }

    pub fn with_limits(max_attempts: usize, window: Duration) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window,
        }
    }

    /// Check whether logins for this email are currently refused
    pub async fn is_limited(&self, email: &str) -> bool {
        let mut attempts = self.attempts.write().await;
        let cutoff = Utc::now() - self.window;

        let entry = attempts.entry(email.to_lowercase()).or_default();
        entry.retain(|time| *time > cutoff);

        entry.len() >= self.max_attempts
    }

    /// Record a failed login attempt
    pub async fn record_failed_attempt(&self, email: &str) {
        let mut attempts = self.attempts.write().await;
        attempts
            .entry(email.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures after a successful login
    pub async fn clear(&self, email: &str) {
        let mut attempts = self.attempts.write().await;
        attempts.remove(&email.to_lowercase());
    }

    /// Drop expired entries. Run periodically from a background task.
    pub async fn cleanup(&self) -> usize {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
        attempts.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
