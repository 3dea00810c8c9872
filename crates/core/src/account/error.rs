//! Account store errors.

use thiserror::Error;

use super::number::AccountNumberError;
use crate::auth::CredentialError;
use crate::ledger::LedgerError;

/// Errors raised by account store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    /// No customer with this owner identity.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Branch code is not registered.
    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    /// The owner identity is reserved for system accounts.
    #[error("Owner identity is reserved: {0}")]
    ReservedIdentity(String),

    /// Credential problem.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Account number problem.
    #[error(transparent)]
    Number(#[from] AccountNumberError),

    /// Ledger level failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl AccountError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            Self::BranchNotFound(_) => "BRANCH_NOT_FOUND",
            Self::ReservedIdentity(_) => "RESERVED_IDENTITY",
            Self::Credential(CredentialError::InvalidPin) => "INVALID_PIN",
            Self::Credential(_) => "CREDENTIAL_ERROR",
            Self::Number(AccountNumberError::SequenceOutOfRange(_)) => "ACCOUNT_NUMBERS_EXHAUSTED",
            Self::Number(_) => "INVALID_ACCOUNT_NUMBER",
            Self::Ledger(e) => e.error_code(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::CustomerNotFound(_) | Self::BranchNotFound(_) => 404,
            Self::ReservedIdentity(_) => 422,
            Self::Credential(CredentialError::InvalidPin)
            | Self::Number(
                AccountNumberError::Malformed
                | AccountNumberError::BadCheckDigit
                | AccountNumberError::MalformedBranch,
            ) => 400,
            Self::Credential(_) | Self::Number(_) => 500,
            Self::Ledger(e) => e.http_status_code(),
        }
    }

    /// Message safe to show to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::CustomerNotFound(_) => "No customer is registered for this user.".to_string(),
            Self::BranchNotFound(code) => format!("Branch {code} does not exist."),
            Self::ReservedIdentity(_) => "This identity cannot own accounts.".to_string(),
            Self::Credential(CredentialError::InvalidPin) => {
                "The PIN must be 4 to 8 digits.".to_string()
            }
            Self::Number(AccountNumberError::SequenceOutOfRange(_)) => {
                "No account numbers are left at this time. Please contact support.".to_string()
            }
            Self::Number(_) => "The account number is not valid.".to_string(),
            Self::Credential(_) => "A system error occurred. Please try again later.".to_string(),
            Self::Ledger(e) => e.user_message(),
        }
    }

    /// Returns true if the operation may succeed when retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Ledger(e) if e.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_delegate_to_ledger() {
        let err = AccountError::from(LedgerError::DuplicateOperation("open".into()));
        assert_eq!(err.error_code(), "DUPLICATE_OPERATION");
        assert_eq!(err.http_status_code(), 409);
    }

    #[test]
    fn test_credential_errors() {
        let err = AccountError::from(CredentialError::InvalidPin);
        assert_eq!(err.http_status_code(), 400);
        assert_eq!(err.error_code(), "INVALID_PIN");
        let err = AccountError::from(CredentialError::InvalidHash);
        assert_eq!(err.http_status_code(), 500);
    }
}
