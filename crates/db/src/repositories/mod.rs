//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.
//! Every mutating method is one unit of work: it opens a transaction, locks
//! what it touches, commits, and is retried as a whole on transient failures.

pub mod account;
pub mod chip;
pub mod collections;
pub mod job_run;
pub mod ledger;
pub mod loan;
pub mod tax;

pub use account::AccountRepository;
pub use chip::{ChipReceipt, ChipRepository};
pub use collections::{CaseTransition, CollectionsRepository, SeizureMovement, SweepReport};
pub use job_run::JobRunRepository;
pub use ledger::LedgerRepository;
pub use loan::{LoanNotice, LoanRepository, MaintenanceReport};
pub use tax::{AssessmentRunReport, RecordedIncome, TaxRepository};
