//! Tax sub-ledger errors.

use kinko_shared::types::AssessmentId;
use rust_decimal::Decimal;
use thiserror::Error;

use super::types::IncomeSource;
use crate::ledger::LedgerError;

/// Errors that can occur during tax operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaxError {
    /// Gross amount is not acceptable for the source.
    #[error("Invalid {} income amount: {amount}", income_source.as_str())]
    InvalidIncome {
        /// Income source.
        income_source: IncomeSource,
        /// Rejected amount.
        amount: Decimal,
    },

    /// Source event identifier is empty.
    #[error("Income source id must not be empty")]
    InvalidSourceId,

    /// Assessment not found.
    #[error("Tax assessment not found: {0}")]
    AssessmentNotFound(AssessmentId),

    /// Nothing left to pay.
    #[error("Tax assessment {0} is already paid")]
    AlreadyPaid(AssessmentId),

    /// Customer has no bank record.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Underlying ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl TaxError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidIncome { .. } => "INVALID_INCOME",
            Self::InvalidSourceId => "INVALID_SOURCE_ID",
            Self::AssessmentNotFound(_) => "ASSESSMENT_NOT_FOUND",
            Self::AlreadyPaid(_) => "ALREADY_PAID",
            Self::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            Self::Ledger(e) => e.error_code(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidIncome { .. } | Self::InvalidSourceId => 400,
            Self::AssessmentNotFound(_) | Self::CustomerNotFound(_) => 404,
            Self::AlreadyPaid(_) => 409,
            Self::Ledger(e) => e.http_status_code(),
        }
    }

    /// Message suitable for showing to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidIncome { .. } | Self::InvalidSourceId => {
                "The income record is invalid.".to_string()
            }
            Self::AssessmentNotFound(_) => "No such tax assessment.".to_string(),
            Self::AlreadyPaid(_) => "This tax bill is already paid.".to_string(),
            Self::CustomerNotFound(_) => "No bank customer was found.".to_string(),
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
