//! The ledger unit of work.
//!
//! Every balance change in the workspace goes through [`post`], called from
//! the operations in this module inside one database transaction. Accounts
//! are locked one row at a time in ascending id order, checks run on the
//! locked rows, and sub-ledgers call the `*_in` style operations with their
//! own transaction so their bookkeeping commits or rolls back with the cash.

mod convert;
mod lock;
mod ops;
mod posting;
mod unit;

pub use convert::{entry_record, parse_currency, snapshot, summary, transaction_record};
pub use lock::{LockedAccounts, lock_accounts, resolve, resolve_all, system_account_id};
pub use ops::{batch, deposit, reverse, transfer, withdraw};
pub use posting::post;
pub use unit::{LedgerSettings, begin};
