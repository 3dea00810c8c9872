//! Collections errors.

use thiserror::Error;
use uuid::Uuid;

use crate::ledger::LedgerError;

/// Errors that can occur during a collections sweep.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionsError {
    /// Case not found.
    #[error("Collections case not found: {0}")]
    CaseNotFound(Uuid),

    /// The obligation a case points at no longer exists.
    #[error("Obligation for case {0} is missing")]
    ObligationMissing(Uuid),

    /// Underlying ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl CollectionsError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::CaseNotFound(_) => "CASE_NOT_FOUND",
            Self::ObligationMissing(_) => "OBLIGATION_MISSING",
            Self::Ledger(e) => e.error_code(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::CaseNotFound(_) => 404,
            Self::ObligationMissing(_) => 500,
            Self::Ledger(e) => e.http_status_code(),
        }
    }

    /// Message suitable for showing to an operator.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::CaseNotFound(_) => "No such collections case.".to_string(),
            Self::ObligationMissing(_) => "A system error occurred during collections.".to_string(),
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
