//! Ledger domain types.
//!
//! Request shapes accepted by the engine, account snapshots taken under row
//! locks, and the posting plans the engine persists.

use kinko_shared::types::{AccountId, Currency, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::entry::{EntryType, PlannedEntry};
use crate::account::AccountRef;

/// Account lifecycle status.
///
/// `active -> frozen -> closed` or `active -> closed`; closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Fully usable.
    Active,
    /// Under enforcement: credits accepted, debits only by system flows.
    Frozen,
    /// Terminal, rejects everything.
    Closed,
}

impl AccountStatus {
    /// Returns true if the account may be debited by `initiator`.
    #[must_use]
    pub const fn can_debit(self, initiator: Initiator) -> bool {
        match self {
            Self::Active => true,
            Self::Frozen => matches!(initiator, Initiator::System),
            Self::Closed => false,
        }
    }

    /// Returns true if the account may receive a credit.
    #[must_use]
    pub const fn can_receive_credit(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Frozen => write!(f, "frozen"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Who started a ledger operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Initiator {
    /// A customer or a collaborator acting for one.
    #[default]
    Customer,
    /// An internal enforcement flow (seizure, reversal).
    System,
}

/// Transaction type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Movement between two accounts.
    Transfer,
    /// Single-sided credit.
    Deposit,
    /// Single-sided debit.
    Withdrawal,
    /// Two-sided fee.
    Fee,
    /// Two-sided interest payment.
    Interest,
}

impl TransactionType {
    /// Returns true if transactions of this type move money between two accounts.
    #[must_use]
    pub const fn is_two_sided(self) -> bool {
        !matches!(self, Self::Deposit | Self::Withdrawal)
    }

    /// Type of the offsetting transaction. A deposit is undone by a withdrawal
    /// and the other way round; two-sided types keep their type.
    #[must_use]
    pub const fn mirrored(self) -> Self {
        match self {
            Self::Deposit => Self::Withdrawal,
            Self::Withdrawal => Self::Deposit,
            other => other,
        }
    }
}

/// Transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Not yet applied.
    Pending,
    /// Applied and immutable.
    Completed,
    /// Rejected before applying.
    Failed,
    /// Offset by a later reversing transaction.
    Reversed,
}

impl TransactionStatus {
    /// Returns true if the only permitted mutation (`completed -> reversed`) applies.
    #[must_use]
    pub const fn is_reversible(self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Two-sided transaction kinds a caller may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    /// Plain transfer.
    #[default]
    Transfer,
    /// Fee charged to the debited account.
    Fee,
    /// Interest paid to the credited account.
    Interest,
}

impl From<TransferKind> for TransactionType {
    fn from(kind: TransferKind) -> Self {
        match kind {
            TransferKind::Transfer => Self::Transfer,
            TransferKind::Fee => Self::Fee,
            TransferKind::Interest => Self::Interest,
        }
    }
}

/// Transfer request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Debited account.
    pub from: AccountRef,
    /// Credited account.
    pub to: AccountRef,
    /// Amount, strictly positive.
    pub amount: Decimal,
    /// Currency both accounts must hold.
    pub currency: Currency,
    /// Free-form description stored on the transaction.
    #[serde(default)]
    pub description: Option<String>,
    /// Transaction type to record.
    #[serde(default)]
    pub kind: TransferKind,
    /// Who initiated the transfer. Never taken from request bodies.
    #[serde(skip)]
    pub initiator: Initiator,
}

/// Deposit or withdrawal request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementRequest {
    /// The account.
    pub account: AccountRef,
    /// Amount, strictly positive.
    pub amount: Decimal,
    /// Currency the account must hold.
    pub currency: Currency,
    /// Free-form description stored on the transaction.
    #[serde(default)]
    pub description: Option<String>,
    /// Who initiated the movement.
    #[serde(skip)]
    pub initiator: Initiator,
}

/// Direction of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchDirection {
    /// Every leg is debited.
    Withdraw,
    /// Every leg is credited.
    Deposit,
}

/// One leg of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchLeg {
    /// The leg account.
    pub account: AccountRef,
    /// Amount, strictly positive.
    pub amount: Decimal,
}

/// Batch transfer request. All legs apply or none do.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTransferRequest {
    /// The legs, applied in order.
    pub legs: Vec<BatchLeg>,
    /// Whether legs are debited or credited.
    pub direction: BatchDirection,
    /// Currency for every leg.
    pub currency: Currency,
    /// Other side of every leg; single-sided movements when absent.
    #[serde(default)]
    pub counterparty: Option<AccountRef>,
    /// Description stored on every transaction.
    #[serde(default)]
    pub description: Option<String>,
    /// Who initiated the batch.
    #[serde(skip)]
    pub initiator: Initiator,
}

/// A batch leg that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegFailure {
    /// Position of the leg in the request.
    pub index: usize,
    /// The leg's account reference.
    pub account: AccountRef,
    /// Why it failed.
    pub error: super::error::LedgerError,
}

/// Result of a batch transfer.
///
/// `failed` non-empty implies `succeeded` is empty and nothing was applied.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Transactions created, one per leg.
    pub succeeded: Vec<TransactionRecord>,
    /// Every failing leg.
    pub failed: Vec<LegFailure>,
}

impl BatchOutcome {
    /// Returns true if the batch was applied.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Account state read under a row lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    /// The account id.
    pub id: AccountId,
    /// Currency held.
    pub currency: Currency,
    /// Current status.
    pub status: AccountStatus,
    /// Current balance.
    pub balance: Decimal,
}

/// A money movement ready to persist: header fields plus entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingPlan {
    /// Type recorded on the header.
    pub transaction_type: TransactionType,
    /// Debited account, if any.
    pub from_account_id: Option<AccountId>,
    /// Credited account, if any.
    pub to_account_id: Option<AccountId>,
    /// Amount moved.
    pub amount: Decimal,
    /// Currency.
    pub currency: Currency,
    /// Description.
    pub description: Option<String>,
    /// Transaction this one offsets.
    pub reverses: Option<TransactionId>,
    /// Entries: one per side.
    pub entries: Vec<PlannedEntry>,
}

impl PostingPlan {
    /// Balance delta per account implied by the entries.
    #[must_use]
    pub fn balance_changes(&self) -> Vec<(AccountId, Decimal)> {
        self.entries
            .iter()
            .map(|e| (e.account_id, e.signed_amount()))
            .collect()
    }
}

/// A persisted transaction header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRecord {
    /// Transaction id.
    pub id: TransactionId,
    /// Type.
    pub transaction_type: TransactionType,
    /// Status.
    pub status: TransactionStatus,
    /// Debited account.
    pub from_account_id: Option<AccountId>,
    /// Credited account.
    pub to_account_id: Option<AccountId>,
    /// Amount.
    pub amount: Decimal,
    /// Currency.
    pub currency: Currency,
    /// Description.
    pub description: Option<String>,
    /// Transaction this one offsets.
    pub reverses_transaction_id: Option<TransactionId>,
    /// Commit time.
    pub executed_at: chrono::DateTime<chrono::Utc>,
}

/// A persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryRecord {
    /// Entry id.
    pub id: uuid::Uuid,
    /// Account the entry applies to.
    pub account_id: AccountId,
    /// Debit or credit.
    pub entry_type: EntryType,
    /// Amount, always positive.
    pub amount: Decimal,
}

/// A transaction header with its entries, for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionDetail {
    /// Header.
    #[serde(flatten)]
    pub transaction: TransactionRecord,
    /// Entries.
    pub entries: Vec<EntryRecord>,
}

/// Direction of a transaction relative to one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money left the account.
    Debit,
    /// Money arrived.
    Credit,
}

/// One line of an account's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionSummary {
    /// Transaction id.
    pub transaction_id: TransactionId,
    /// Type.
    pub transaction_type: TransactionType,
    /// Status.
    pub status: TransactionStatus,
    /// Direction for the queried account.
    pub direction: Direction,
    /// Amount.
    pub amount: Decimal,
    /// Currency.
    pub currency: Currency,
    /// The other account, for two-sided transactions.
    pub counterparty_account_id: Option<AccountId>,
    /// Description.
    pub description: Option<String>,
    /// Commit time.
    pub executed_at: chrono::DateTime<chrono::Utc>,
}

/// Maximum page size for history queries.
pub const MAX_HISTORY_LIMIT: u64 = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_rules() {
        assert!(AccountStatus::Active.can_debit(Initiator::Customer));
        assert!(!AccountStatus::Frozen.can_debit(Initiator::Customer));
        assert!(AccountStatus::Frozen.can_debit(Initiator::System));
        assert!(!AccountStatus::Closed.can_debit(Initiator::System));

        assert!(AccountStatus::Active.can_receive_credit());
        assert!(AccountStatus::Frozen.can_receive_credit());
        assert!(!AccountStatus::Closed.can_receive_credit());
    }

    #[test]
    fn test_only_completed_is_reversible() {
        assert!(TransactionStatus::Completed.is_reversible());
        assert!(!TransactionStatus::Reversed.is_reversible());
        assert!(!TransactionStatus::Pending.is_reversible());
        assert!(!TransactionStatus::Failed.is_reversible());
    }

    #[test]
    fn test_request_defaults() {
        let request: TransferRequest = serde_json::from_value(serde_json::json!({
            "from": { "account_id": AccountId::new() },
            "to": { "account_id": AccountId::new() },
            "amount": "3000",
            "currency": "JPY",
        }))
        .unwrap();
        assert_eq!(request.kind, TransferKind::Transfer);
        assert_eq!(request.initiator, Initiator::Customer);
        assert!(request.description.is_none());
    }
}
