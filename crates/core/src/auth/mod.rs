//! Customer credentials.
//!
//! Customers authenticate with a numeric PIN hashed with Argon2id. After
//! `MAX_FAILED_ATTEMPTS` consecutive failures authentication stays locked
//! until an operator resets the credentials.

mod pin;

pub use pin::{CredentialError, hash_pin, validate_pin, verify_pin};

/// Consecutive failures that lock authentication.
pub const MAX_FAILED_ATTEMPTS: i32 = 5;

/// Returns true if authentication is locked after `failed_attempts`.
#[must_use]
pub const fn is_locked(failed_attempts: i32) -> bool {
    failed_attempts >= MAX_FAILED_ATTEMPTS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lockout_threshold() {
        assert!(!is_locked(0));
        assert!(!is_locked(MAX_FAILED_ATTEMPTS - 1));
        assert!(is_locked(MAX_FAILED_ATTEMPTS));
    }
}
