//! Loan sub-ledger errors.

use kinko_shared::types::LoanId;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::ledger::LedgerError;

/// Errors that can occur during loan operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoanError {
    /// Borrower is blacklisted.
    #[error("Borrower is blacklisted")]
    Blacklisted,

    /// One active loan per customer.
    #[error("Borrower already has an active loan")]
    ActiveLoanExists,

    /// No recent income to lend against.
    #[error("No recent income baseline")]
    NoIncomeBaseline,

    /// Principal above the income-based cap.
    #[error("Requested principal {requested} exceeds limit {limit}")]
    PrincipalExceedsLimit {
        /// Requested principal.
        requested: Decimal,
        /// Cap.
        limit: Decimal,
    },

    /// Principal is not a positive multiple of the repayment unit.
    #[error("Invalid principal: {0}")]
    InvalidPrincipal(Decimal),

    /// Repayment is not a positive multiple of the repayment unit.
    #[error("Invalid repayment amount: {0}")]
    InvalidRepayment(Decimal),

    /// Loan not found.
    #[error("Loan not found: {0}")]
    LoanNotFound(LoanId),

    /// Loan already resolved.
    #[error("Loan {0} is not active")]
    LoanNotActive(LoanId),

    /// Borrower has no bank record.
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    /// Underlying ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl LoanError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Blacklisted => "BORROWER_BLACKLISTED",
            Self::ActiveLoanExists => "ACTIVE_LOAN_EXISTS",
            Self::NoIncomeBaseline => "NO_INCOME_BASELINE",
            Self::PrincipalExceedsLimit { .. } => "PRINCIPAL_EXCEEDS_LIMIT",
            Self::InvalidPrincipal(_) => "INVALID_PRINCIPAL",
            Self::InvalidRepayment(_) => "INVALID_REPAYMENT",
            Self::LoanNotFound(_) => "LOAN_NOT_FOUND",
            Self::LoanNotActive(_) => "LOAN_NOT_ACTIVE",
            Self::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND",
            Self::Ledger(e) => e.error_code(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidPrincipal(_) | Self::InvalidRepayment(_) => 400,
            Self::LoanNotFound(_) | Self::CustomerNotFound(_) => 404,
            Self::ActiveLoanExists => 409,
            Self::Blacklisted
            | Self::NoIncomeBaseline
            | Self::PrincipalExceedsLimit { .. }
            | Self::LoanNotActive(_) => 422,
            Self::Ledger(e) => e.http_status_code(),
        }
    }

    /// Message suitable for showing to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Blacklisted => {
                "You are blacklisted and cannot borrow until your overdue payments are settled."
                    .to_string()
            }
            Self::ActiveLoanExists => "Repay your current loan before borrowing again.".to_string(),
            Self::NoIncomeBaseline => {
                "There is no recent income to lend against.".to_string()
            }
            Self::PrincipalExceedsLimit { limit, .. } => {
                format!("You can borrow at most {}.", limit.normalize())
            }
            Self::InvalidPrincipal(_) | Self::InvalidRepayment(_) => {
                "The amount must be a positive multiple of the loan unit.".to_string()
            }
            Self::LoanNotFound(_) | Self::CustomerNotFound(_) => "No such loan.".to_string(),
            Self::LoanNotActive(_) => "This loan is already repaid.".to_string(),
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
    use rust_decimal_macros::dec;

    #[test]
    fn test_codes_and_statuses() {
        assert_eq!(LoanError::ActiveLoanExists.http_status_code(), 409);
        assert_eq!(
            LoanError::PrincipalExceedsLimit {
                requested: dec!(50000),
                limit: dec!(30000),
            }
            .error_code(),
            "PRINCIPAL_EXCEEDS_LIMIT"
        );
        let wrapped = LoanError::from(LedgerError::InsufficientFunds {
            account: kinko_shared::types::AccountId::new(),
            available: dec!(0),
            requested: dec!(1),
        });
        assert_eq!(wrapped.error_code(), "INSUFFICIENT_FUNDS");
        assert_eq!(wrapped.http_status_code(), 422);
    }
}
