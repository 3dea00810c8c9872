//! Property-based tests for TaxService.
//!
//! Feature: taxation
//! - Property 1: Tax is non-negative, whole and monotonic in income
//! - Property 2: Periods are full ISO weeks before the run date

use chrono::{Datelike, Days, NaiveDate, Weekday};
use kinko_shared::config::TaxConfig;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::{TaxPolicy, TaxService};
use super::types::IncomeTotals;

fn income() -> impl Strategy<Value = Decimal> {
    (0i64..100_000_000i64).prop_map(Decimal::from)
}

fn totals(ordinary: Decimal, gambling: Decimal) -> IncomeTotals {
    IncomeTotals {
        gross: ordinary + gambling,
        ordinary_taxable: ordinary,
        gambling,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1.1: tax is a whole non-negative amount below taxable income.
    #[test]
    fn prop_tax_bounds(ordinary in income(), gambling in income()) {
        let policy = TaxPolicy::from(&TaxConfig::default());
        let result = TaxService::compute(&policy, &totals(ordinary, gambling));
        prop_assert!(result.tax_amount >= Decimal::ZERO);
        prop_assert_eq!(result.tax_amount, result.tax_amount.trunc());
        prop_assert!(result.tax_amount <= result.taxable_income);
        prop_assert!((result.taxable_income % policy.rounding_unit).is_zero());
    }

    /// Property 1.2: more income never means less tax.
    #[test]
    fn prop_tax_monotonic(a in income(), b in income()) {
        let policy = TaxPolicy::from(&TaxConfig::default());
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let low_tax = TaxService::compute(&policy, &totals(low, Decimal::ZERO)).tax_amount;
        let high_tax = TaxService::compute(&policy, &totals(high, Decimal::ZERO)).tax_amount;
        prop_assert!(low_tax <= high_tax);
    }

    /// Property 2.1: the period runs Monday to Sunday and ends before the run date's week.
    #[test]
    fn prop_period_shape(offset in 0u64..3_000) {
        let run_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(offset);
        let period = TaxService::period_for(run_date);
        prop_assert_eq!(period.start.weekday(), Weekday::Mon);
        prop_assert_eq!(period.end.weekday(), Weekday::Sun);
        prop_assert_eq!((period.end - period.start).num_days(), 6);
        prop_assert!(period.end < run_date);
        prop_assert!((run_date - period.end).num_days() <= 7);
    }
}
