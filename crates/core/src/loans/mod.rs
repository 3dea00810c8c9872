//! Loan sub-ledger.
//!
//! Principal moves from the loan reserve to the borrower through the ledger.
//! Interest accrues on the loan's own outstanding balance with no cash
//! movement; cash only moves on repayment.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::LoanError;
pub use service::{LoanPolicy, LoanService};
pub use types::{
    BorrowRequest, Eligibility, LoanPaymentKind, LoanQuote, LoanState, LoanStatus, PaymentStatus,
};
