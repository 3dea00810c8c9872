//! Double-entry ledger engine logic.
//!
//! - Ledger entries (debits and credits) and their symmetry rules
//! - Request, snapshot and posting-plan types
//! - Error taxonomy shared by every sub-ledger
//! - `LedgerService`, which plans movements against locked snapshots

pub mod entry;
pub mod error;
pub mod service;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;
#[cfg(test)]
mod validation_props;

pub use entry::{EntryType, PlannedEntry};
pub use error::LedgerError;
pub use service::LedgerService;
pub use types::{
    AccountSnapshot, AccountStatus, BatchDirection, BatchLeg, BatchOutcome, BatchTransferRequest,
    Direction, EntryRecord, Initiator, LegFailure, MAX_HISTORY_LIMIT, MovementRequest,
    PostingPlan, TransactionDetail, TransactionRecord, TransactionStatus, TransactionSummary,
    TransactionType, TransferKind, TransferRequest,
};
pub use validation::{LedgerValidationError, validate_entries};
