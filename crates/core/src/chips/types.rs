//! Chip balances and lock splits.

use serde::{Deserialize, Serialize};

/// Chip balances of one customer.
///
/// Invariant: `0 <= locked_base <= base` and `0 <= locked_bonus <= bonus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChipBalance {
    /// Purchased (or won) chips.
    pub base: i64,
    /// Promotional chips.
    pub bonus: i64,
    /// Base chips committed to an unsettled round.
    pub locked_base: i64,
    /// Bonus chips committed to an unsettled round.
    pub locked_bonus: i64,
}

impl ChipBalance {
    /// Base chips not committed to a round.
    #[must_use]
    pub const fn available_base(&self) -> i64 {
        self.base - self.locked_base
    }

    /// Bonus chips not committed to a round.
    #[must_use]
    pub const fn available_bonus(&self) -> i64 {
        self.bonus - self.locked_bonus
    }

    /// All uncommitted chips.
    #[must_use]
    pub const fn available(&self) -> i64 {
        self.available_base().saturating_add(self.available_bonus())
    }

    /// Returns true if the balance invariant holds.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.locked_base >= 0
            && self.locked_bonus >= 0
            && self.locked_base <= self.base
            && self.locked_bonus <= self.bonus
    }
}

/// Chips committed to one round, split by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LockSplit {
    /// Locked base chips.
    pub base: i64,
    /// Locked bonus chips.
    pub bonus: i64,
}

impl LockSplit {
    /// Total locked chips.
    #[must_use]
    pub const fn total(&self) -> i64 {
        self.base + self.bonus
    }
}

/// One participant of a lock batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRequest {
    /// Participant.
    pub owner_identity: String,
    /// Chips to commit.
    pub amount: i64,
}

/// Lifecycle of a per-round lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipLockStatus {
    /// Chips committed, round not settled.
    Held,
    /// Settled with a payout.
    Settled,
    /// Round cancelled, chips returned.
    Released,
}

/// Kinds of chip movement recorded in the chip journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChipTransactionKind {
    /// Bought with cash.
    Purchase,
    /// Promotional grant.
    Bonus,
    /// Committed to a round.
    Lock,
    /// Round cancelled.
    Release,
    /// Round settled.
    Settlement,
    /// Sent to another customer.
    TransferOut,
    /// Received from another customer.
    TransferIn,
    /// Exchanged for cash.
    Redeem,
}
