//! Password hashing and policy
//!
//! Passwords are hashed with Argon2id using the argon2 crate defaults and a
//! random salt per hash. `validate_password` enforces the account policy:
//! 8 to 128 characters with at least one letter and one digit.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum password length in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;
/// Maximum password length in characters
pub const MAX_PASSWORD_LENGTH: usize = 128;

static HAS_LETTER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]").unwrap());
static HAS_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]").unwrap());

/// Hash a password using Argon2id with secure defaults.
///
/// Returns the PHC string (algorithm, parameters, salt and hash).
///
/// ```ignore
/// use authors_haven::services::password::hash_password;
///
/// let hash = hash_password("my_secure_password1")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored hash.
///
/// Returns an error only if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    let argon2 = Argon2::default();

    match argon2.verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

/// Check a new password against the policy, returning the user-facing message on failure.
pub fn validate_password(password: &str) -> Result<(), String> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Ensure this field has at least {} characters.",
            MIN_PASSWORD_LENGTH
        ));
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(format!(
            "Ensure this field has no more than {} characters.",
            MAX_PASSWORD_LENGTH
        ));
    }
    if !HAS_LETTER.is_match(password) || !HAS_DIGIT.is_match(password) {
        return Err(
            "Invalid password. Please choose a password with at least a letter and a number."
                .to_string(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_produces_argon2id_hash() {
        let hash = hash_password("test_password_123").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$"), "Hash should use Argon2id");
    }

    #[test]
    fn test_hash_password_produces_different_hashes() {
        let hash1 = hash_password("same_password1").expect("Failed to hash password");
        let hash2 = hash_password("same_password1").expect("Failed to hash password");
        assert_ne!(hash1, hash2, "Random salts should give different hashes");
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct_password1").expect("Failed to hash password");
        assert!(verify_password("correct_password1", &hash).unwrap());
        assert!(!verify_password("wrong_password1", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "invalid_hash_format").is_err());
    }

    #[test]
    fn test_password_hash_not_equal_to_password() {
        let password = "my_secret_password9";
        let hash = hash_password(password).expect("Failed to hash password");
        assert!(!hash.contains(password));
    }

    #[test]
    fn test_policy_length_bounds() {
        assert!(validate_password("abc123").unwrap_err().contains("at least 8"));
        let long = format!("a1{}", "b".repeat(127));
        assert!(validate_password(&long).unwrap_err().contains("no more than 128"));
        assert!(validate_password("abcdefg1").is_ok());
    }

    #[test]
    fn test_policy_requires_letter_and_digit() {
        let msg = validate_password("onlyletters").unwrap_err();
        assert!(msg.starts_with("Invalid password"));
        assert!(validate_password("1234567890").is_err());
        assert!(validate_password("p4ssword").is_ok());
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Any 8..=128 char password mixing letters and digits passes.
        #[test]
        fn mixed_passwords_pass(letters in "[a-zA-Z]{1,60}", digits in "[0-9]{1,60}") {
            let password = format!("{}{}", letters, digits);
            prop_assume!(password.len() >= MIN_PASSWORD_LENGTH);
            prop_assert!(validate_password(&password).is_ok());
        }

        /// Digit-only passwords never pass.
        #[test]
        fn digit_only_passwords_fail(digits in "[0-9]{8,40}") {
            prop_assert!(validate_password(&digits).is_err());
        }
    }
}
