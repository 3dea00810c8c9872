//! Ledger error types.
//!
//! Every variant except `ExternalSystemUnavailable` and `Internal` is a
//! deterministic business outcome: it is returned to the caller as is and
//! never retried.

use kinko_shared::types::{AccountId, Currency, TransactionId};
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::AccountStatus;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Amount is zero, negative or has too many decimal places.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Debit and credit side name the same account, or a reference is unusable.
    #[error("Invalid account reference: {0}")]
    InvalidAccountReference(String),

    // ========== Account Errors ==========
    /// No account matches the reference.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account status forbids the requested operation.
    #[error("Account {account} is {status} and cannot be used for this operation")]
    AccountNotUsable {
        /// The account.
        account: AccountId,
        /// Its current status.
        status: AccountStatus,
    },

    /// Account currency differs from the request currency.
    #[error("Currency mismatch: account holds {expected}, request uses {actual}")]
    CurrencyMismatch {
        /// The account's currency.
        expected: Currency,
        /// The requested currency.
        actual: Currency,
    },

    /// Not enough balance for the debit.
    #[error("Insufficient funds in account {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// The debited account.
        account: AccountId,
        /// Balance at the time of the check.
        available: Decimal,
        /// Requested debit.
        requested: Decimal,
    },

    /// Closing an account that still holds money.
    #[error("Account {0} still holds a balance")]
    BalanceRemaining(AccountId),

    // ========== Transaction Errors ==========
    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Transaction is not in a reversible state.
    #[error("Transaction {0} cannot be reversed")]
    NotReversible(TransactionId),

    /// The operation was already applied.
    #[error("Duplicate operation: {0}")]
    DuplicateOperation(String),

    // ========== System Errors ==========
    /// Database unreachable, lock timeout, serialization failure. Retryable.
    #[error("External system unavailable: {0}")]
    ExternalSystemUnavailable(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidAccountReference(_) => "INVALID_ACCOUNT_REFERENCE",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::AccountNotUsable { .. } => "ACCOUNT_NOT_USABLE",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::BalanceRemaining(_) => "BALANCE_REMAINING",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::NotReversible(_) => "NOT_REVERSIBLE",
            Self::DuplicateOperation(_) => "DUPLICATE_OPERATION",
            Self::ExternalSystemUnavailable(_) => "EXTERNAL_SYSTEM_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::InvalidAmount(_) | Self::InvalidAccountReference(_) => 400,

            // 404 Not Found
            Self::AccountNotFound(_) | Self::TransactionNotFound(_) => 404,

            // 409 Conflict
            Self::DuplicateOperation(_) => 409,

            // 422 Unprocessable - business rule rejections
            Self::AccountNotUsable { .. }
            | Self::CurrencyMismatch { .. }
            | Self::InsufficientFunds { .. }
            | Self::BalanceRemaining(_)
            | Self::NotReversible(_) => 422,

            // 503 Service Unavailable
            Self::ExternalSystemUnavailable(_) => 503,

            // 500 Internal Server Error
            Self::Internal(_) => 500,
        }
    }

    /// Message suitable for showing to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidAmount(_) => "The amount must be a positive number.".to_string(),
            Self::InvalidAccountReference(_) => {
                "Please choose two different, valid accounts.".to_string()
            }
            Self::AccountNotFound(reference) => {
                format!("No account was found for {reference}.")
            }
            Self::AccountNotUsable { status, .. } => {
                format!("This account is {status} and cannot be used for this operation.")
            }
            Self::CurrencyMismatch { expected, actual } => {
                format!("This account holds {expected}; the request was in {actual}.")
            }
            Self::InsufficientFunds {
                available,
                requested,
                ..
            } => format!(
                "Insufficient funds: {} requested, {} available.",
                requested.normalize(),
                available.normalize()
            ),
            Self::BalanceRemaining(_) => {
                "The account still holds money. Withdraw or transfer it before closing.".to_string()
            }
            Self::TransactionNotFound(_) => "No such transaction.".to_string(),
            Self::NotReversible(_) => "This transaction cannot be reversed.".to_string(),
            Self::DuplicateOperation(_) => "This operation has already been processed.".to_string(),
            Self::ExternalSystemUnavailable(_) => {
                "The banking system is temporarily unavailable. Please try again shortly."
                    .to_string()
            }
            Self::Internal(_) => "A system error occurred. No money was moved.".to_string(),
        }
    }

    /// Returns true if the whole unit of work may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalSystemUnavailable(_))
    }
}
