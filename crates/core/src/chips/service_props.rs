//! Property-based tests for ChipService.
//!
//! Feature: chip-economy
//! - Property 1: Lock invariant `locked <= balance` always holds
//! - Property 2: Settlement conserves chips up to the payout
//! - Property 3: Lock batches are all-or-nothing

use proptest::prelude::*;

use super::service::ChipService;
use super::types::ChipBalance;

fn balance() -> impl Strategy<Value = ChipBalance> {
    (0i64..10_000, 0i64..10_000).prop_map(|(base, bonus)| ChipBalance {
        base,
        bonus,
        locked_base: 0,
        locked_bonus: 0,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1.1: any successful lock keeps the balance consistent and
    /// prefers base chips.
    #[test]
    fn prop_lock_keeps_invariant(start in balance(), amount in 1i64..20_000) {
        match ChipService::split_lock(&start, amount) {
            Some(split) => {
                let locked = ChipService::apply_lock(start, split);
                prop_assert!(locked.is_consistent());
                prop_assert_eq!(split.total(), amount);
                prop_assert!(split.bonus == 0 || split.base == start.base);
            }
            None => prop_assert!(amount > start.available()),
        }
    }

    /// Property 2.1: after settlement the total is `before - locked + payout`
    /// and nothing stays locked.
    #[test]
    fn prop_settlement_accounting(start in balance(), amount in 1i64..20_000, payout in 0i64..50_000) {
        prop_assume!(amount <= start.available());
        let split = ChipService::split_lock(&start, amount).unwrap();
        let settled = ChipService::apply_settlement(ChipService::apply_lock(start, split), split, payout).unwrap();

        prop_assert!(settled.is_consistent());
        prop_assert_eq!(settled.locked_base + settled.locked_bonus, 0);
        prop_assert_eq!(
            settled.base + settled.bonus,
            start.base + start.bonus - amount + payout
        );
    }

    /// Property 3.1: a batch either locks everyone or reports exactly the
    /// participants who cannot cover their amount.
    #[test]
    fn prop_lock_batch_all_or_nothing(
        rows in prop::collection::vec((balance(), 1i64..20_000), 1..6),
    ) {
        let participants: Vec<(String, ChipBalance, i64)> = rows
            .iter()
            .enumerate()
            .map(|(i, (b, a))| (format!("U{i}"), *b, *a))
            .collect();
        let short: Vec<String> = participants
            .iter()
            .filter(|(_, b, a)| *a > b.available())
            .map(|(o, _, _)| o.clone())
            .collect();

        match ChipService::plan_lock_batch(&participants) {
            Ok(splits) => {
                prop_assert!(short.is_empty());
                prop_assert_eq!(splits.len(), participants.len());
            }
            Err(super::error::ChipError::LockRejected(shortfalls)) => {
                let names: Vec<String> = shortfalls.into_iter().map(|s| s.owner_identity).collect();
                prop_assert_eq!(names, short);
            }
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }
}
