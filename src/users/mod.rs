//! User accounts.
//!
//! Registration rules and password hashing. Credential verification happens
//! here; token handling lives in `api::auth`. Hashes are PBKDF2-HMAC-SHA256
//! with a per-user random salt, stored as `hex(salt)$hex(hash)`.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use rand::RngCore;
use regex::Regex;
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::task::FieldError;

const PBKDF2_ROUNDS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 50;
pub const MIN_PASSWORD_LEN: usize = 6;

/// A stored user account.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// The externally visible shape of a user (no credential material).
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            created_at: user.created_at,
        }
    }
}

impl User {
    /// Build a new account from validated registration input.
    pub fn new(name: &str, email: &str, password: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            password_hash: hash_password(password),
            created_at: now,
        }
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex"))
}

/// Validate registration input, reporting every violated field.
pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();

    let name = name.trim();
    if name.chars().count() < MIN_NAME_LEN || name.chars().count() > MAX_NAME_LEN {
        errors.push(FieldError::new(
            "name",
            format!(
                "Name must be between {} and {} characters",
                MIN_NAME_LEN, MAX_NAME_LEN
            ),
        ));
    }

    if !email_regex().is_match(email.trim()) {
        errors.push(FieldError::new("email", "Please provide a valid email"));
    }

    check_password_strength(password, "password", &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a new password on change-password.
pub fn validate_new_password(password: &str) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    check_password_strength(password, "new_password", &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_password_strength(password: &str, field: &str, errors: &mut Vec<FieldError>) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            field,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        errors.push(FieldError::new(
            field,
            "Password must contain at least one uppercase letter, \
             one lowercase letter, and one number",
        ));
    }
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut hash = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ROUNDS, &mut hash);
    format!("{}${}", hex::encode(salt), hex::encode(hash))
}

/// Verify a password against a stored `salt$hash` string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, hash_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };
    let mut actual = vec![0u8; expected.len().max(1)];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ROUNDS, &mut actual);
    constant_time_eq(&actual, &expected)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_round_trip() {
        let stored = hash_password("Sup3rSecret");
        assert!(verify_password("Sup3rSecret", &stored));
        assert!(!verify_password("Sup3rSecret2", &stored));
        // Salts are random, so two hashes of the same password differ.
        assert_ne!(stored, hash_password("Sup3rSecret"));
    }

    #[test]
    fn test_verify_rejects_malformed_stored_value() {
        assert!(!verify_password("anything", "not-a-hash"));
        assert!(!verify_password("anything", "zz$zz"));
    }

    #[test]
    fn test_registration_validation() {
        assert!(validate_registration("Alice", "alice@example.com", "Passw0rd").is_ok());

        let errors =
            validate_registration("A", "not-an-email", "weak").unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"password"));
    }

    #[test]
    fn test_password_needs_all_character_classes() {
        assert!(validate_new_password("alllowercase1").is_err());
        assert!(validate_new_password("NoDigitsHere").is_err());
        assert!(validate_new_password("Short1").is_ok());
    }

    #[test]
    fn test_new_user_normalizes_email() {
        let user = User::new(" Alice ", " Alice@Example.COM ", "Passw0rd", Utc::now());
        assert_eq!(user.name, "Alice");
        assert_eq!(user.email, "alice@example.com");
    }
}
