//! Property-based tests for CollectionsService.
//!
//! Feature: collections
//! - Property 1: Seizure never takes more than is due or than an account holds
//! - Property 2: Re-evaluating on the same day is a no-op

use chrono::{Days, NaiveDate};
use kinko_shared::config::CollectionsConfig;
use kinko_shared::types::{AccountId, Currency};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::{CollectionsPolicy, CollectionsService};
use super::types::{CaseKind, CaseState, CaseStatus, Obligation};
use crate::ledger::{AccountSnapshot, AccountStatus};

fn amount() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000i64).prop_map(Decimal::from)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1.1: the seizure plan is bounded by what is due and by each balance.
    #[test]
    fn prop_seizure_bounded(
        balances in prop::collection::vec(amount(), 0..6),
        due in amount(),
    ) {
        let accounts: Vec<AccountSnapshot> = balances
            .iter()
            .map(|b| AccountSnapshot {
                id: AccountId::new(),
                currency: Currency::Jpy,
                status: AccountStatus::Frozen,
                balance: *b,
            })
            .collect();
        let plan = CollectionsService::plan_seizure(&accounts, due);

        let total: Decimal = plan.iter().map(|(_, a)| *a).sum();
        let available: Decimal = balances.iter().copied().sum();
        prop_assert_eq!(total, due.min(available));
        for (id, taken) in &plan {
            let account = accounts.iter().find(|a| a.id == *id).unwrap();
            prop_assert!(*taken > Decimal::ZERO && *taken <= account.balance);
        }
        prop_assert!(plan.windows(2).all(|w| w[0].0 < w[1].0));
    }

    /// Property 2.1: applying a decision and evaluating again the same day
    /// changes nothing.
    #[test]
    fn prop_evaluate_idempotent(
        loan in any::<bool>(),
        day in 0u64..40,
        due in 1i64..1_000_000,
    ) {
        let policy = CollectionsPolicy::from(&CollectionsConfig::default());
        let start = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let today = start + Days::new(day);
        let (kind, status, obligation) = if loan {
            (CaseKind::Loan, CaseStatus::Overdue, Obligation {
                amount_due: Decimal::from(due),
                due_on: None,
                failing_since: Some(start),
            })
        } else {
            (CaseKind::Tax, CaseStatus::InPaymentWindow, Obligation {
                amount_due: Decimal::from(due),
                due_on: Some(start + Days::new(7)),
                failing_since: None,
            })
        };
        let case = CaseState { kind, status, overdue_since: None, blacklisted: false };

        let first = CollectionsService::evaluate(&policy, &case, &obligation, today);
        let persisted = CaseState {
            kind,
            status: first.status,
            overdue_since: first.overdue_since,
            blacklisted: first.blacklist,
        };
        let second = CollectionsService::evaluate(&policy, &persisted, &obligation, today);
        prop_assert_eq!(first, second);
        prop_assert!(!second.changes(&persisted));
    }
}
