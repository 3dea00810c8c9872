//! Loan domain types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::account::AccountRef;

/// Loan lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// Outstanding balance remains.
    Active,
    /// Paid off. Terminal.
    Resolved,
}

/// How a repayment was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanPaymentKind {
    /// Daily automatic debit.
    Autopay,
    /// Borrower-initiated repayment.
    Manual,
    /// Collected by the collections engine.
    Seizure,
}

/// Outcome of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Cash moved.
    Succeeded,
    /// Ledger rejected the debit.
    Failed,
}

/// State of one loan as far as the rules need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanState {
    /// Outstanding balance including accrued interest.
    pub outstanding: Decimal,
    /// Normal weekly rate.
    pub weekly_rate: Decimal,
    /// Weekly rate while autopay is failing.
    pub penalty_weekly_rate: Decimal,
    /// Amount each autopay run collects.
    pub autopay_amount: Decimal,
    /// Status.
    pub status: LoanStatus,
    /// First day of the current autopay failure streak.
    pub autopay_failed_since: Option<NaiveDate>,
    /// Last business date interest was accrued.
    pub last_accrued_on: Option<NaiveDate>,
    /// Last business date autopay ran.
    pub last_autopay_on: Option<NaiveDate>,
}

/// Inputs of the borrowing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eligibility {
    /// Borrower is blacklisted.
    pub blacklisted: bool,
    /// Borrower already has an active loan.
    pub has_active_loan: bool,
    /// Gross income recorded in the baseline window.
    pub income_in_window: Decimal,
}

/// A borrowing request.
#[derive(Debug, Clone, Deserialize)]
pub struct BorrowRequest {
    /// Borrower.
    pub owner_identity: String,
    /// Principal to borrow.
    pub principal: Decimal,
    /// Account the principal is paid into.
    pub disbursement_account: AccountRef,
    /// Account autopay debits. Defaults to the disbursement account.
    #[serde(default)]
    pub autopay_account: Option<AccountRef>,
    /// Amount per autopay run. Defaults to a share of the principal.
    #[serde(default)]
    pub autopay_amount: Option<Decimal>,
}

/// Approved loan terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoanQuote {
    /// Principal to disburse.
    pub principal: Decimal,
    /// Weekly income baseline used for the decision.
    pub income_baseline: Decimal,
    /// Largest principal the baseline allows.
    pub max_principal: Decimal,
    /// Normal weekly rate.
    pub weekly_rate: Decimal,
    /// Penalty weekly rate.
    pub penalty_weekly_rate: Decimal,
    /// Amount collected per autopay run.
    pub autopay_amount: Decimal,
}
