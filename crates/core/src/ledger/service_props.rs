//! Property-based tests for LedgerService.
//!
//! Feature: ledger-engine
//! - Property 1: Conservation of money under transfers
//! - Property 2: No negative balance through transfer or withdrawal
//! - Property 3: Entry symmetry of every plan
//! - Property 4: Batch atomicity
//! - Property 5: Deterministic lock order

use std::collections::HashMap;

use kinko_shared::types::{AccountId, Currency};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::LedgerService;
use super::types::{
    AccountSnapshot, AccountStatus, BatchDirection, BatchLeg, BatchTransferRequest, Initiator,
    MovementRequest, PostingPlan, TransferKind, TransferRequest,
};
use super::validation::validate_entries;
use crate::account::AccountRef;

/// Strategy for whole-yen amounts (1 to 10,000).
fn amount() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000i64).prop_map(Decimal::from)
}

/// Strategy for starting balances (0 to 20,000).
fn balance() -> impl Strategy<Value = Decimal> {
    (0i64..=20_000i64).prop_map(Decimal::from)
}

fn snapshot(balance: Decimal) -> AccountSnapshot {
    AccountSnapshot {
        id: AccountId::new(),
        currency: Currency::Jpy,
        status: AccountStatus::Active,
        balance,
    }
}

fn transfer_request(from: AccountId, to: AccountId, amount: Decimal) -> TransferRequest {
    TransferRequest {
        from: AccountRef::id(from),
        to: AccountRef::id(to),
        amount,
        currency: Currency::Jpy,
        description: None,
        kind: TransferKind::Transfer,
        initiator: Initiator::Customer,
    }
}

/// Applies a plan to an in-memory book the way the engine applies it to rows.
fn apply(book: &mut HashMap<AccountId, AccountSnapshot>, plan: &PostingPlan) {
    for (id, delta) in plan.balance_changes() {
        if let Some(account) = book.get_mut(&id) {
            account.balance += delta;
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1.1: transfers alone never change the total balance.
    ///
    /// *For any* sequence of transfers among a set of accounts, the sum of
    /// balances after applying the successful ones SHALL equal the sum before.
    #[test]
    fn prop_transfers_conserve_total(
        balances in prop::collection::vec(balance(), 2..6),
        moves in prop::collection::vec((0usize..6, 0usize..6, amount()), 1..30),
    ) {
        let accounts: Vec<AccountSnapshot> = balances.into_iter().map(snapshot).collect();
        let ids: Vec<AccountId> = accounts.iter().map(|a| a.id).collect();
        let mut book: HashMap<AccountId, AccountSnapshot> =
            accounts.into_iter().map(|a| (a.id, a)).collect();
        let total_before: Decimal = book.values().map(|a| a.balance).sum();

        for (from, to, amount) in moves {
            let from = ids[from % ids.len()];
            let to = ids[to % ids.len()];
            let request = transfer_request(from, to, amount);
            if let Ok(plan) = LedgerService::plan_transfer(&request, &book[&from], &book[&to]) {
                apply(&mut book, &plan);
            }
        }

        let total_after: Decimal = book.values().map(|a| a.balance).sum();
        prop_assert_eq!(total_before, total_after);
    }

    /// Property 1.2: deposits and withdrawals change the total by their net.
    #[test]
    fn prop_movements_change_total_by_net(
        start in balance(),
        deposits in prop::collection::vec(amount(), 0..10),
        withdrawals in prop::collection::vec(amount(), 0..10),
    ) {
        let account = snapshot(start);
        let id = account.id;
        let mut book = HashMap::from([(id, account)]);
        let mut net = Decimal::ZERO;

        for (amount, deposit) in deposits
            .into_iter()
            .map(|a| (a, true))
            .chain(withdrawals.into_iter().map(|a| (a, false)))
        {
            let request = MovementRequest {
                account: AccountRef::id(id),
                amount,
                currency: Currency::Jpy,
                description: None,
                initiator: Initiator::Customer,
            };
            let plan = if deposit {
                LedgerService::plan_deposit(&request, &book[&id])
            } else {
                LedgerService::plan_withdrawal(&request, &book[&id])
            };
            if let Ok(plan) = plan {
                net += if deposit { amount } else { -amount };
                apply(&mut book, &plan);
            }
        }

        prop_assert_eq!(book[&id].balance, start + net);
    }

    /// Property 2.1: a transfer or withdrawal never drives a balance negative.
    ///
    /// *For any* request exceeding the balance, planning SHALL fail, so the
    /// balance is left unchanged.
    #[test]
    fn prop_no_negative_balance(start in balance(), requested in amount()) {
        let from = snapshot(start);
        let to = snapshot(Decimal::ZERO);
        let result = LedgerService::plan_transfer(&transfer_request(from.id, to.id, requested), &from, &to);
        if requested > start {
            prop_assert!(result.is_err());
        } else {
            let plan = result.unwrap();
            prop_assert!(start + plan.balance_changes()[0].1 >= Decimal::ZERO);
        }
    }

    /// Property 3.1: every transfer plan has exactly one debit and one
    /// credit of equal amount, summing to zero.
    #[test]
    fn prop_transfer_entries_symmetric(start in balance(), requested in amount()) {
        prop_assume!(requested <= start);
        let from = snapshot(start);
        let to = snapshot(Decimal::ZERO);
        let plan = LedgerService::plan_transfer(
            &transfer_request(from.id, to.id, requested),
            &from,
            &to,
        )
        .unwrap();

        prop_assert!(validate_entries(&plan.entries, true).is_ok());
        let sum: Decimal = plan.entries.iter().map(super::entry::PlannedEntry::signed_amount).sum();
        prop_assert_eq!(sum, Decimal::ZERO);
    }

    /// Property 4.1: a batch with any failing leg yields no plans at all,
    /// and every underfunded leg is reported.
    #[test]
    fn prop_batch_all_or_nothing(
        legs in prop::collection::vec((balance(), amount()), 1..8),
    ) {
        let accounts: Vec<AccountSnapshot> = legs.iter().map(|(b, _)| snapshot(*b)).collect();
        let request = BatchTransferRequest {
            legs: accounts
                .iter()
                .zip(&legs)
                .map(|(a, (_, amount))| BatchLeg { account: AccountRef::id(a.id), amount: *amount })
                .collect(),
            direction: BatchDirection::Withdraw,
            currency: Currency::Jpy,
            counterparty: None,
            description: None,
            initiator: Initiator::Customer,
        };
        let resolved: Vec<_> = accounts.iter().cloned().map(Ok).collect();
        let underfunded: Vec<usize> = legs
            .iter()
            .enumerate()
            .filter(|(_, (b, a))| a > b)
            .map(|(i, _)| i)
            .collect();

        match LedgerService::plan_batch(&request, &resolved, None) {
            Ok(plans) => {
                prop_assert!(underfunded.is_empty());
                prop_assert_eq!(plans.len(), legs.len());
            }
            Err(failures) => {
                let failed: Vec<usize> = failures.iter().map(|f| f.index).collect();
                prop_assert_eq!(failed, underfunded);
            }
        }
    }

    /// Property 5.1: lock order is independent of request order.
    ///
    /// *For any* two orderings of the same accounts (A->B vs B->A), the lock
    /// order SHALL be identical, so opposite transfers cannot deadlock.
    #[test]
    fn prop_lock_order_is_canonical(count in 1usize..8, rotate in 0usize..8) {
        let ids: Vec<AccountId> = (0..count).map(|_| AccountId::new()).collect();
        let mut rotated = ids.clone();
        rotated.rotate_left(rotate % count);
        rotated.push(ids[0]);

        let a = LedgerService::lock_order(ids.clone());
        let b = LedgerService::lock_order(rotated);
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.len(), count);
        prop_assert!(a.windows(2).all(|w| w[0] < w[1]));
    }
}
