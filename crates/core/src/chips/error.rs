//! Chip sub-ledger errors.

use thiserror::Error;

use crate::ledger::LedgerError;

/// A participant who could not cover their lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipShortfall {
    /// Participant.
    pub owner_identity: String,
    /// Chips available at the time of the check.
    pub available: i64,
    /// Chips requested.
    pub requested: i64,
}

/// Errors that can occur during chip operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChipError {
    /// Chip amount is zero or negative.
    #[error("Invalid chip amount: {0}")]
    InvalidAmount(i64),

    /// Not enough available chips.
    #[error("{owner_identity} has {available} chips available, {requested} requested")]
    InsufficientChips {
        /// Customer.
        owner_identity: String,
        /// Available chips of the relevant kind.
        available: i64,
        /// Requested chips.
        requested: i64,
    },

    /// A lock batch could not be applied; nobody was locked.
    #[error("Lock batch rejected for {} participant(s)", .0.len())]
    LockRejected(Vec<ChipShortfall>),

    /// The same customer appears twice in one batch.
    #[error("Duplicate participant: {0}")]
    DuplicateParticipant(String),

    /// A payout names a customer without a lock in the session.
    #[error("{owner_identity} holds no chips in session {session}")]
    NotInSession {
        /// Customer.
        owner_identity: String,
        /// Game session.
        session: String,
    },

    /// No locks exist for the session.
    #[error("Game session not found: {0}")]
    SessionNotFound(String),

    /// Customer has no chip profile or bank record.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Redemption needs a registered account.
    #[error("{0} has no redemption account")]
    NoRedemptionAccount(String),

    /// Chips cannot be sent to oneself.
    #[error("Cannot transfer chips to yourself")]
    SelfTransfer,

    /// Underlying ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl ChipError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_CHIP_AMOUNT",
            Self::InsufficientChips { .. } => "INSUFFICIENT_CHIPS",
            Self::LockRejected(_) => "CHIP_LOCK_REJECTED",
            Self::DuplicateParticipant(_) => "DUPLICATE_PARTICIPANT",
            Self::NotInSession { .. } => "NOT_IN_SESSION",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            Self::NoRedemptionAccount(_) => "NO_REDEMPTION_ACCOUNT",
            Self::SelfTransfer => "SELF_TRANSFER",
            Self::Ledger(e) => e.error_code(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidAmount(_) | Self::DuplicateParticipant(_) | Self::SelfTransfer => 400,
            Self::SessionNotFound(_) | Self::CustomerNotFound(_) => 404,
            Self::InsufficientChips { .. }
            | Self::LockRejected(_)
            | Self::NotInSession { .. }
            | Self::NoRedemptionAccount(_) => 422,
            Self::Ledger(e) => e.http_status_code(),
        }
    }

    /// Message suitable for showing to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidAmount(_) => "The number of chips must be positive.".to_string(),
            Self::InsufficientChips {
                available,
                requested,
                ..
            } => format!("Not enough chips: {requested} requested, {available} available."),
            Self::LockRejected(shortfalls) => {
                let names: Vec<&str> =
                    shortfalls.iter().map(|s| s.owner_identity.as_str()).collect();
                format!("The round could not start. Not enough chips: {}.", names.join(", "))
            }
            Self::DuplicateParticipant(owner) => format!("{owner} is listed twice."),
            Self::NotInSession { owner_identity, .. } => {
                format!("{owner_identity} is not part of this round.")
            }
            Self::SessionNotFound(_) => "This round does not exist.".to_string(),
            Self::CustomerNotFound(_) => "No bank customer was found.".to_string(),
            Self::NoRedemptionAccount(_) => {
                "Register a redemption account before redeeming chips.".to_string()
            }
            Self::SelfTransfer => "You cannot send chips to yourself.".to_string(),
            Self::Ledger(e) => e.user_message(),
        }
    }

    /// Returns true if the whole unit of work may be retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(e) => e.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_pass_through() {
        let err = ChipError::from(LedgerError::ExternalSystemUnavailable("db".into()));
        assert_eq!(err.error_code(), "EXTERNAL_SYSTEM_UNAVAILABLE");
        assert_eq!(err.http_status_code(), 503);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_lock_rejection_names_participants() {
        let err = ChipError::LockRejected(vec![ChipShortfall {
            owner_identity: "U2".into(),
            available: 10,
            requested: 50,
        }]);
        assert_eq!(err.http_status_code(), 422);
        assert!(err.user_message().contains("U2"));
        assert!(!err.is_retryable());
    }
}
