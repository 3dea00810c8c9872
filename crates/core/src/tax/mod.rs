//! Taxation sub-ledger.
//!
//! Income events are recorded idempotently per source; a weekly assessment
//! applies the progressive bracket table and payments move cash to the tax
//! authority account.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::TaxError;
pub use service::{TaxPolicy, TaxService};
pub use types::{
    AssessmentPeriod, IncomeSource, IncomeTotals, TaxAssessmentStatus, TaxBracket, TaxComputation,
};
