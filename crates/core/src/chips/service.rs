//! Chip service: lock, settle, release and price calculations.

use std::collections::HashSet;

use kinko_shared::config::ChipConfig;
use rust_decimal::Decimal;

use super::error::{ChipError, ChipShortfall};
use super::types::{ChipBalance, LockSplit};

/// Cash prices of the chip economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipPolicy {
    /// Cash paid per purchased chip.
    pub price_per_chip: Decimal,
    /// Cash returned per redeemed base chip.
    pub redeem_rate: Decimal,
}

impl From<&ChipConfig> for ChipPolicy {
    fn from(config: &ChipConfig) -> Self {
        Self {
            price_per_chip: config.price_per_chip,
            redeem_rate: config.redeem_rate,
        }
    }
}

/// Pure chip bookkeeping.
pub struct ChipService;

impl ChipService {
    /// Rejects non-positive chip amounts.
    ///
    /// # Errors
    ///
    /// `ChipError::InvalidAmount`.
    pub fn validate_amount(amount: i64) -> Result<(), ChipError> {
        if amount > 0 {
            Ok(())
        } else {
            Err(ChipError::InvalidAmount(amount))
        }
    }

    /// Splits a lock: base chips first, the remainder from bonus chips.
    #[must_use]
    pub fn split_lock(balance: &ChipBalance, amount: i64) -> Option<LockSplit> {
        if amount <= 0 || balance.available() < amount {
            return None;
        }
        let base = amount.min(balance.available_base());
        Some(LockSplit {
            base,
            bonus: amount - base,
        })
    }

    /// Plans the locks of a whole round.
    ///
    /// Returns one split per participant in input order, or every shortfall.
    /// Nothing is locked unless every participant can cover their amount.
    ///
    /// # Errors
    ///
    /// `InvalidAmount`, `DuplicateParticipant` or `LockRejected`.
    pub fn plan_lock_batch(
        participants: &[(String, ChipBalance, i64)],
    ) -> Result<Vec<LockSplit>, ChipError> {
        let mut seen = HashSet::new();
        let mut splits = Vec::with_capacity(participants.len());
        let mut shortfalls = Vec::new();

        for (owner, balance, amount) in participants {
            Self::validate_amount(*amount)?;
            if !seen.insert(owner.as_str()) {
                return Err(ChipError::DuplicateParticipant(owner.clone()));
            }
            match Self::split_lock(balance, *amount) {
                Some(split) => splits.push(split),
                None => shortfalls.push(ChipShortfall {
                    owner_identity: owner.clone(),
                    available: balance.available(),
                    requested: *amount,
                }),
            }
        }

        if shortfalls.is_empty() {
            Ok(splits)
        } else {
            Err(ChipError::LockRejected(shortfalls))
        }
    }

    /// Applies a lock split.
    #[must_use]
    pub const fn apply_lock(balance: ChipBalance, split: LockSplit) -> ChipBalance {
        ChipBalance {
            locked_base: balance.locked_base + split.base,
            locked_bonus: balance.locked_bonus + split.bonus,
            ..balance
        }
    }

    /// Returns a cancelled round's chips without changing balances.
    #[must_use]
    pub const fn apply_release(balance: ChipBalance, split: LockSplit) -> ChipBalance {
        ChipBalance {
            locked_base: balance.locked_base - split.base,
            locked_bonus: balance.locked_bonus - split.bonus,
            ..balance
        }
    }

    /// Settles a round: the locked chips are spent, the payout is credited
    /// as base chips.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` for a negative payout or one the balance cannot hold.
    pub fn apply_settlement(
        balance: ChipBalance,
        split: LockSplit,
        payout: i64,
    ) -> Result<ChipBalance, ChipError> {
        if payout < 0 {
            return Err(ChipError::InvalidAmount(payout));
        }
        let base = (balance.base - split.base)
            .checked_add(payout)
            .ok_or(ChipError::InvalidAmount(payout))?;
        Ok(ChipBalance {
            base,
            bonus: balance.bonus - split.bonus,
            locked_base: balance.locked_base - split.base,
            locked_bonus: balance.locked_bonus - split.bonus,
        })
    }

    /// Credits base chips (purchases and incoming transfers).
    ///
    /// # Errors
    ///
    /// `InvalidAmount` for a non-positive amount or an overflowing balance.
    pub fn credit_base(balance: ChipBalance, amount: i64) -> Result<ChipBalance, ChipError> {
        Self::validate_amount(amount)?;
        let base = balance
            .base
            .checked_add(amount)
            .ok_or(ChipError::InvalidAmount(amount))?;
        Ok(ChipBalance { base, ..balance })
    }

    /// Credits bonus chips.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` for a non-positive amount or an overflowing balance.
    pub fn credit_bonus(balance: ChipBalance, amount: i64) -> Result<ChipBalance, ChipError> {
        Self::validate_amount(amount)?;
        let bonus = balance
            .bonus
            .checked_add(amount)
            .ok_or(ChipError::InvalidAmount(amount))?;
        Ok(ChipBalance { bonus, ..balance })
    }

    /// Debits available base chips (transfers and redemptions).
    ///
    /// # Errors
    ///
    /// `InvalidAmount` or `InsufficientChips`.
    pub fn debit_base(
        owner_identity: &str,
        balance: ChipBalance,
        amount: i64,
    ) -> Result<ChipBalance, ChipError> {
        Self::validate_amount(amount)?;
        if balance.available_base() < amount {
            return Err(ChipError::InsufficientChips {
                owner_identity: owner_identity.to_string(),
                available: balance.available_base(),
                requested: amount,
            });
        }
        Ok(ChipBalance {
            base: balance.base - amount,
            ..balance
        })
    }

    /// Cash price of `chips` chips.
    #[must_use]
    pub fn purchase_price(policy: &ChipPolicy, chips: i64) -> Decimal {
        Decimal::from(chips) * policy.price_per_chip
    }

    /// Cash value of redeeming `chips` base chips.
    #[must_use]
    pub fn redemption_value(policy: &ChipPolicy, chips: i64) -> Decimal {
        Decimal::from(chips) * policy.redeem_rate
    }

    /// Taxable gambling income for a settled participant, if they came out ahead.
    #[must_use]
    pub fn gambling_income(policy: &ChipPolicy, split: LockSplit, payout: i64) -> Option<Decimal> {
        let net = payout - split.total();
        (net > 0).then(|| Decimal::from(net) * policy.redeem_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance(base: i64, bonus: i64) -> ChipBalance {
        ChipBalance {
            base,
            bonus,
            locked_base: 0,
            locked_bonus: 0,
        }
    }

    #[test]
    fn test_lock_spills_into_bonus() {
        let split = ChipService::split_lock(&balance(30, 50), 60).unwrap();
        assert_eq!(split, LockSplit { base: 30, bonus: 30 });
        assert!(ChipService::split_lock(&balance(30, 50), 81).is_none());
    }

    #[test]
    fn test_batch_rejects_all_when_one_short() {
        let participants = vec![
            ("U1".to_string(), balance(100, 0), 50),
            ("U2".to_string(), balance(10, 0), 50),
            ("U3".to_string(), balance(100, 0), 50),
        ];
        match ChipService::plan_lock_batch(&participants) {
            Err(ChipError::LockRejected(shortfalls)) => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].owner_identity, "U2");
                assert_eq!(shortfalls[0].available, 10);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_batch_rejects_duplicates() {
        let participants = vec![
            ("U1".to_string(), balance(100, 0), 10),
            ("U1".to_string(), balance(100, 0), 10),
        ];
        assert_eq!(
            ChipService::plan_lock_batch(&participants),
            Err(ChipError::DuplicateParticipant("U1".into()))
        );
    }

    #[test]
    fn test_settlement_spends_lock_and_credits_payout() {
        let start = balance(30, 50);
        let split = ChipService::split_lock(&start, 60).unwrap();
        let locked = ChipService::apply_lock(start, split);
        assert_eq!(locked.available(), 20);

        let settled = ChipService::apply_settlement(locked, split, 120).unwrap();
        assert_eq!(
            settled,
            ChipBalance {
                base: 120,
                bonus: 20,
                locked_base: 0,
                locked_bonus: 0,
            }
        );
    }

    #[test]
    fn test_settlement_rejects_payout_beyond_chip_range() {
        let start = balance(i64::MAX - 5, 0);
        let split = ChipService::split_lock(&start, 10).unwrap();
        let locked = ChipService::apply_lock(start, split);
        assert_eq!(
            ChipService::apply_settlement(locked, split, 100),
            Err(ChipError::InvalidAmount(100))
        );
        assert!(ChipService::apply_settlement(locked, split, 15).is_ok());
    }

    #[test]
    fn test_credits_reject_overflow() {
        assert_eq!(
            ChipService::credit_base(balance(i64::MAX, 0), 1),
            Err(ChipError::InvalidAmount(1))
        );
        assert_eq!(
            ChipService::credit_bonus(balance(0, i64::MAX - 1), 2),
            Err(ChipError::InvalidAmount(2))
        );
        assert_eq!(ChipService::credit_base(balance(5, 7), 3).unwrap(), balance(8, 7));
        assert_eq!(ChipService::credit_bonus(balance(5, 7), 3).unwrap(), balance(5, 10));
    }

    #[test]
    fn test_release_restores_balance() {
        let start = balance(30, 50);
        let split = ChipService::split_lock(&start, 60).unwrap();
        let released = ChipService::apply_release(ChipService::apply_lock(start, split), split);
        assert_eq!(released, start);
    }

    #[test]
    fn test_bonus_chips_cannot_leave() {
        let err = ChipService::debit_base("U1", balance(10, 500), 20).unwrap_err();
        assert_eq!(
            err,
            ChipError::InsufficientChips {
                owner_identity: "U1".into(),
                available: 10,
                requested: 20,
            }
        );
    }

    #[test]
    fn test_locked_base_cannot_be_debited() {
        let locked = ChipService::apply_lock(balance(100, 0), LockSplit { base: 80, bonus: 0 });
        assert!(ChipService::debit_base("U1", locked, 30).is_err());
        assert!(ChipService::debit_base("U1", locked, 20).is_ok());
    }

    #[test]
    fn test_prices() {
        let policy = ChipPolicy {
            price_per_chip: dec!(10),
            redeem_rate: dec!(9.5),
        };
        assert_eq!(ChipService::purchase_price(&policy, 100), dec!(1000));
        assert_eq!(ChipService::redemption_value(&policy, 100), dec!(950));
        let split = LockSplit { base: 40, bonus: 10 };
        assert_eq!(ChipService::gambling_income(&policy, split, 150), Some(dec!(950)));
        assert_eq!(ChipService::gambling_income(&policy, split, 50), None);
    }
}
