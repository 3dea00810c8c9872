//! Property-based tests for entry validation.
//!
//! - Property 6: Symmetric pairs are accepted, asymmetric ones rejected

use kinko_shared::types::AccountId;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::entry::PlannedEntry;
use super::validation::{LedgerValidationError, validate_entries};

/// Strategy for amounts with up to four decimal places.
fn amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|v| Decimal::new(v, 4))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 6.1: a debit/credit pair of equal amount is valid in either order.
    #[test]
    fn prop_symmetric_pair_accepted(amount in amount(), credit_first in any::<bool>()) {
        let mut entries = vec![
            PlannedEntry::debit(AccountId::new(), amount),
            PlannedEntry::credit(AccountId::new(), amount),
        ];
        if credit_first {
            entries.reverse();
        }
        prop_assert!(validate_entries(&entries, true).is_ok());
    }

    /// Property 6.2: unequal amounts are rejected as unbalanced.
    #[test]
    fn prop_asymmetric_pair_rejected(debit in amount(), credit in amount()) {
        prop_assume!(debit != credit);
        let entries = [
            PlannedEntry::debit(AccountId::new(), debit),
            PlannedEntry::credit(AccountId::new(), credit),
        ];
        let is_unbalanced = matches!(
            validate_entries(&entries, true),
            Err(LedgerValidationError::Unbalanced { .. })
        );
        prop_assert!(is_unbalanced);
    }

    /// Property 6.3: flipping a pair keeps it valid and negates each signed amount.
    #[test]
    fn prop_flipped_pair_valid(amount in amount()) {
        let entries = [
            PlannedEntry::debit(AccountId::new(), amount),
            PlannedEntry::credit(AccountId::new(), amount),
        ];
        let flipped: Vec<PlannedEntry> = entries.iter().map(|e| e.flipped()).collect();
        prop_assert!(validate_entries(&flipped, true).is_ok());
        for (a, b) in entries.iter().zip(&flipped) {
            prop_assert_eq!(a.signed_amount(), -b.signed_amount());
        }
    }
}
