//! Collections and enforcement rules.
//!
//! A case follows one unpaid obligation (a tax assessment or a loan)
//! through `in_payment_window -> overdue -> seizure -> resolved`. The amount
//! still due is recomputed from the ledger on every sweep, never cached.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::CollectionsError;
pub use service::{CollectionsPolicy, CollectionsService};
pub use types::{CaseDecision, CaseKind, CaseState, CaseStatus, Obligation};
