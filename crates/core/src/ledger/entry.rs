//! Ledger entry domain types.

use kinko_shared::types::AccountId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Type of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Money leaves the account.
    Debit,
    /// Money enters the account.
    Credit,
}

/// One leg of a transaction before it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedEntry {
    /// The account affected by this entry.
    pub account_id: AccountId,
    /// Whether this is a debit or credit.
    pub entry_type: EntryType,
    /// Amount, always positive.
    pub amount: Decimal,
}

impl PlannedEntry {
    /// Debit entry.
    #[must_use]
    pub const fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            entry_type: EntryType::Debit,
            amount,
        }
    }

    /// Credit entry.
    #[must_use]
    pub const fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            entry_type: EntryType::Credit,
            amount,
        }
    }

    /// Signed amount: debit = -amount, credit = +amount.
    ///
    /// This is also the balance delta the entry applies to its account.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        match self.entry_type {
            EntryType::Debit => -self.amount,
            EntryType::Credit => self.amount,
        }
    }

    /// The same leg with the opposite side.
    #[must_use]
    pub const fn flipped(self) -> Self {
        Self {
            account_id: self.account_id,
            entry_type: match self.entry_type {
                EntryType::Debit => EntryType::Credit,
                EntryType::Credit => EntryType::Debit,
            },
            amount: self.amount,
        }
    }
}
