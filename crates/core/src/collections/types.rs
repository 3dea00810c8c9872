//! Collections case types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What the case collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseKind {
    /// An unpaid tax assessment.
    Tax,
    /// A loan with failing autopay.
    Loan,
}

/// Case status, in escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Before the due date.
    InPaymentWindow,
    /// Past due, not yet seizing.
    Overdue,
    /// Funds are seized on every sweep.
    Seizure,
    /// Nothing left to collect. Terminal.
    Resolved,
}

/// Persisted case state the rules need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseState {
    /// Kind.
    pub kind: CaseKind,
    /// Current status.
    pub status: CaseStatus,
    /// First overdue day, once known.
    pub overdue_since: Option<NaiveDate>,
    /// Whether the case already blacklisted the customer.
    pub blacklisted: bool,
}

/// Current state of the underlying obligation, read fresh each sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Obligation {
    /// Amount still owed.
    pub amount_due: Decimal,
    /// Tax: last day of the payment window.
    pub due_on: Option<NaiveDate>,
    /// Loan: first day of the autopay failure streak.
    pub failing_since: Option<NaiveDate>,
}

/// What the sweep should do with a case today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaseDecision {
    /// Status after this sweep.
    pub status: CaseStatus,
    /// First overdue day.
    pub overdue_since: Option<NaiveDate>,
    /// Customer must be (or stay) blacklisted.
    pub blacklist: bool,
    /// Amount to seize today.
    pub seize: Option<Decimal>,
}

impl CaseDecision {
    /// Returns true if the decision changes the persisted case.
    #[must_use]
    pub fn changes(&self, case: &CaseState) -> bool {
        self.status != case.status
            || self.overdue_since != case.overdue_since
            || self.blacklist != case.blacklisted
    }
}
