//! Token issuing and verification
//!
//! - `JwtManager` signs HS256 tokens for API access and account activation.
//! - `ResetTokenGenerator` makes single-purpose password reset tokens: an
//!   HMAC-SHA256 over the user id, current password hash, issue time and a
//!   random nonce.
//!   Changing the password invalidates every outstanding reset token.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::models::User;

type HmacSha256 = Hmac<Sha256>;

/// Activation links stay valid for three days
const ACTIVATION_TTL_DAYS: i64 = 3;

/// What a JWT may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    #[default]
    Access,
    Activation,
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub purpose: TokenPurpose,
}

impl Claims {
    pub fn new(user: &User, purpose: TokenPurpose, expires_in: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id.to_string(),
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            purpose,
        }
    }

    /// Numeric user id carried in `sub`
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Token verification errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Expired Token.")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Signs and verifies JWTs with a shared secret
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, access_ttl_seconds: i64) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl: Duration::seconds(access_ttl_seconds),
        }
    }

    /// Issue an API access token
    pub fn issue_access(&self, user: &User) -> Result<String, TokenError> {
        self.encode(&Claims::new(user, TokenPurpose::Access, self.access_ttl))
    }

    /// Issue an account activation token
    pub fn issue_activation(&self, user: &User) -> Result<String, TokenError> {
        self.encode(&Claims::new(
            user,
            TokenPurpose::Activation,
            Duration::days(ACTIVATION_TTL_DAYS),
        ))
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Decode a token and check it was issued for `purpose`
    pub fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })?;

        if claims.purpose != purpose || claims.user_id().is_none() {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}

/// Password reset token generator
pub struct ResetTokenGenerator {
    secret: Vec<u8>,
    timeout: Duration,
}

impl ResetTokenGenerator {
    pub fn new(secret: &str, timeout_days: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            timeout: Duration::days(timeout_days),
        }
    }

    /// Make a token of the form `{timestamp}-{nonce}-{hex hmac}`
    pub fn make_token(&self, user: &User) -> Result<String, TokenError> {
        self.make_token_at(user, Utc::now().timestamp())
    }

    fn make_token_at(&self, user: &User, timestamp: i64) -> Result<String, TokenError> {
        let nonce = Uuid::new_v4().simple().to_string();
        let signature: String = self
            .mac(user, timestamp, &nonce)?
            .finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        Ok(format!("{}-{}-{}", timestamp, nonce, signature))
    }

    /// Check the signature against the user's current state and the token age
    pub fn check_token(&self, user: &User, token: &str) -> bool {
        self.check_token_at(user, token, Utc::now())
    }

    fn check_token_at(&self, user: &User, token: &str, now: DateTime<Utc>) -> bool {
        let mut parts = token.splitn(3, '-');
        let (Some(ts), Some(nonce), Some(signature)) = (parts.next(), parts.next(), parts.next()) else {
            return false;
        };
        let Ok(timestamp) = ts.parse::<i64>() else {
            return false;
        };
        let Some(issued) = Utc.timestamp_opt(timestamp, 0).single() else {
            return false;
        };
        if now - issued > self.timeout || issued > now {
            return false;
        }

        let (Ok(mac), Some(bytes)) = (self.mac(user, timestamp, nonce), decode_hex(signature)) else {
            return false;
        };
        mac.verify_slice(&bytes).is_ok()
    }

    fn mac(&self, user: &User, timestamp: i64, nonce: &str) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        mac.update(Self::payload(user, timestamp, nonce).as_bytes());
        Ok(mac)
    }

    fn payload(user: &User, timestamp: i64, nonce: &str) -> String {
        format!("{}{}{}{}", user.id, user.password_hash, timestamp, nonce)
    }
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let mut user = User::new("amina".into(), "amina@example.com".into(), "hash-v1".into());
        user.id = 42;
        user
    }

    #[test]
    fn test_access_token_round_trip() {
        let jwt = JwtManager::new("secret", 3600);
        let token = jwt.issue_access(&user()).unwrap();

        let claims = jwt.verify(&token, TokenPurpose::Access).unwrap();
        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.username, "amina");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_purpose_is_enforced() {
        let jwt = JwtManager::new("secret", 3600);
        let activation = jwt.issue_activation(&user()).unwrap();
        assert_eq!(jwt.verify(&activation, TokenPurpose::Access).unwrap_err(), TokenError::Invalid);
        assert!(jwt.verify(&activation, TokenPurpose::Activation).is_ok());
    }

    #[test]
    fn test_expired_token() {
        let jwt = JwtManager::new("secret", 3600);
        let claims = Claims::new(&user(), TokenPurpose::Access, Duration::seconds(-120));
        let token = jwt.encode(&claims).unwrap();
        assert_eq!(jwt.verify(&token, TokenPurpose::Access).unwrap_err(), TokenError::Expired);
        assert_eq!(TokenError::Expired.to_string(), "Expired Token.");
    }

    #[test]
    fn test_wrong_secret_and_garbage() {
        let token = JwtManager::new("secret", 3600).issue_access(&user()).unwrap();
        let other = JwtManager::new("other", 3600);
        assert_eq!(other.verify(&token, TokenPurpose::Access).unwrap_err(), TokenError::Invalid);
        assert_eq!(other.verify("not.a.jwt", TokenPurpose::Access).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn test_reset_token_valid_for_same_user() {
        let generator = ResetTokenGenerator::new("secret", 3);
        let token = generator.make_token(&user()).unwrap();
        assert!(generator.check_token(&user(), &token));
    }

    #[test]
    fn test_reset_token_invalidated_by_password_change() {
        let generator = ResetTokenGenerator::new("secret", 3);
        let token = generator.make_token(&user()).unwrap();

        let mut changed = user();
        changed.password_hash = "hash-v2".into();
        assert!(!generator.check_token(&changed, &token));

        let mut other = user();
        other.id = 7;
        assert!(!generator.check_token(&other, &token));
    }

    #[test]
    fn test_reset_token_expires() {
        let generator = ResetTokenGenerator::new("secret", 3);
        let issued = Utc::now() - Duration::days(4);
        let token = generator.make_token_at(&user(), issued.timestamp()).unwrap();
        assert!(!generator.check_token(&user(), &token));

        let recent = generator
            .make_token_at(&user(), (Utc::now() - Duration::days(2)).timestamp())
            .unwrap();
        assert!(generator.check_token_at(&user(), &recent, Utc::now()));
    }

    #[test]
    fn test_reset_token_malformed() {
        let generator = ResetTokenGenerator::new("secret", 3);
        assert!(!generator.check_token(&user(), "garbage"));
        assert!(!generator.check_token(&user(), "123-zz"));
        assert!(!generator.check_token(&user(), "123-abc-zz"));
        assert!(!generator.check_token(&user(), ""));
    }

    #[test]
    fn test_reset_tokens_differ_within_the_same_second() {
        let generator = ResetTokenGenerator::new("secret", 3);
        let now = Utc::now().timestamp();
        let first = generator.make_token_at(&user(), now).unwrap();
        let second = generator.make_token_at(&user(), now).unwrap();

        assert_ne!(first, second);
        assert!(generator.check_token(&user(), &first));
        assert!(generator.check_token(&user(), &second));

        // A swapped nonce breaks the signature
        let (_, first_sig) = first.rsplit_once('-').unwrap();
        let (second_prefix, _) = second.rsplit_once('-').unwrap();
        assert!(!generator.check_token(&user(), &format!("{}-{}", second_prefix, first_sig)));
    }
}
