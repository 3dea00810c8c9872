//! PIN hashing with Argon2id.

use argon2::{
    Argon2, PasswordHash,
    password_hash::{PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

/// Errors that can occur during credential operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// PIN is not 4 to 8 digits.
    #[error("PIN must be 4 to 8 digits")]
    InvalidPin,

    /// Failed to hash the PIN.
    #[error("failed to hash credential: {0}")]
    HashError(String),

    /// Failed to verify the PIN.
    #[error("failed to verify credential: {0}")]
    VerifyError(String),

    /// Stored hash is not a PHC string.
    #[error("invalid credential hash format")]
    InvalidHash,
}

/// Checks the PIN format.
///
/// # Errors
///
/// Returns `CredentialError::InvalidPin` unless the PIN is 4 to 8 ASCII digits.
pub fn validate_pin(pin: &str) -> Result<(), CredentialError> {
    if (4..=8).contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(CredentialError::InvalidPin)
    }
}

/// Validates and hashes a PIN.
///
/// # Errors
///
/// Returns `InvalidPin` or `HashError`.
///
/// # Example
///
/// ```
/// use kinko_core::auth::hash_pin;
///
/// let hash = hash_pin("4821").unwrap();
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_pin(pin: &str) -> Result<String, CredentialError> {
    validate_pin(pin)?;
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::HashError(e.to_string()))
}

/// Verifies a PIN against a stored hash.
///
/// # Errors
///
/// Returns `InvalidHash` if the stored hash is malformed and `VerifyError`
/// if verification fails unexpectedly. A wrong PIN is `Ok(false)`.
pub fn verify_pin(pin: &str, hash: &str) -> Result<bool, CredentialError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| CredentialError::InvalidHash)?;

    match Argon2::default().verify_password(pin.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CredentialError::VerifyError(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1234", true)]
    #[case("12345678", true)]
    #[case("123", false)]
    #[case("123456789", false)]
    #[case("12a4", false)]
    #[case("", false)]
    fn test_pin_format(#[case] pin: &str, #[case] valid: bool) {
        assert_eq!(validate_pin(pin).is_ok(), valid);
    }

    #[test]
    fn test_verify_correct_and_wrong_pin() {
        let hash = hash_pin("4821").unwrap();
        assert!(verify_pin("4821", &hash).unwrap());
        assert!(!verify_pin("4822", &hash).unwrap());
    }

    #[test]
    fn test_same_pin_different_hashes() {
        assert_ne!(hash_pin("4821").unwrap(), hash_pin("4821").unwrap());
    }

    #[test]
    fn test_hash_rejects_bad_pin() {
        assert_eq!(hash_pin("12"), Err(CredentialError::InvalidPin));
    }

    #[test]
    fn test_invalid_hash_format() {
        assert_eq!(verify_pin("4821", "invalid_hash"), Err(CredentialError::InvalidHash));
    }
}
