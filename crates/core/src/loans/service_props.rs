//! Property-based tests for LoanService.
//!
//! Feature: loans
//! - Property 1: Daily maintenance is idempotent per business date
//! - Property 2: Payments never drive the outstanding balance negative
//! - Property 3: Pricing respects the principal and rate caps

use chrono::{Days, NaiveDate};
use kinko_shared::config::LoanConfig;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::{LoanPolicy, LoanService};
use super::types::{Eligibility, LoanPaymentKind, LoanState, LoanStatus};

fn outstanding() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|v| Decimal::new(v, 2))
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
}

fn loan(outstanding: Decimal, failing: bool) -> LoanState {
    LoanState {
        outstanding,
        weekly_rate: Decimal::new(7, 2),
        penalty_weekly_rate: Decimal::new(25, 2),
        autopay_amount: Decimal::from(1_000),
        status: LoanStatus::Active,
        autopay_failed_since: failing.then(base_date),
        last_accrued_on: None,
        last_autopay_on: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1.1: accruing twice on the same date equals accruing once.
    #[test]
    fn prop_accrual_idempotent(amount in outstanding(), failing in any::<bool>(), offset in 0u64..30) {
        let today = base_date().checked_add_days(Days::new(offset)).unwrap();
        let once = LoanService::apply_accrual(loan(amount, failing), today);
        let twice = LoanService::apply_accrual(once, today);
        prop_assert_eq!(once, twice);
        prop_assert!(once.outstanding >= amount);
        prop_assert!(once.outstanding.scale() <= 4);
    }

    /// Property 2.1: any payment leaves `outstanding >= 0`, and zero means resolved.
    #[test]
    fn prop_payment_never_negative(amount in outstanding(), paid in outstanding()) {
        let after = LoanService::apply_payment(loan(amount, false), paid, LoanPaymentKind::Manual, base_date());
        prop_assert!(after.outstanding >= Decimal::ZERO);
        prop_assert_eq!(after.outstanding.is_zero(), after.status == LoanStatus::Resolved);
    }

    /// Property 2.2: the autopay amount never exceeds the outstanding balance.
    #[test]
    fn prop_autopay_capped(amount in outstanding()) {
        let due = LoanService::autopay_due(&loan(amount, false), base_date()).unwrap();
        prop_assert!(due <= amount);
    }

    /// Property 3.1: approved loans respect the cap and the maximum rate.
    #[test]
    fn prop_quote_within_caps(income in 1i64..10_000_000, units in 1i64..1_000) {
        let policy = LoanPolicy::from(&LoanConfig::default());
        let principal = Decimal::from(units) * policy.repayment_unit;
        let eligibility = Eligibility {
            blacklisted: false,
            has_active_loan: false,
            income_in_window: Decimal::from(income),
        };
        if let Ok(quote) = LoanService::quote(&policy, &eligibility, principal, None) {
            prop_assert!(quote.principal <= quote.max_principal);
            prop_assert!(quote.weekly_rate <= policy.max_weekly_rate);
            prop_assert!(quote.weekly_rate > Decimal::ZERO);
            prop_assert!(quote.autopay_amount <= principal);
        }
    }
}
