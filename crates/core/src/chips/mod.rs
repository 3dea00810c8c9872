//! Chip economy sub-ledger.
//!
//! Chips are a bookkeeping projection backed by cash held in the chip shop
//! account. Base chips are bought and redeemable; bonus chips are granted,
//! use-only and never transferable.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::{ChipError, ChipShortfall};
pub use service::{ChipPolicy, ChipService};
pub use types::{ChipBalance, ChipLockStatus, ChipTransactionKind, LockRequest, LockSplit};
