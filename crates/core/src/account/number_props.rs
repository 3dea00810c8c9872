//! Property-based tests for account numbers.
//!
//! - Property 1: every sequence value yields a valid, parseable number
//! - Property 2: distinct sequence values never collide
//! - Property 3: any single-digit change is detected

use proptest::prelude::*;

use super::number::{AccountNumber, AccountNumberError, MAX_SEQUENCE};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1: generated numbers round-trip through parsing.
    #[test]
    fn prop_generated_numbers_parse(seq in 1i64..=MAX_SEQUENCE) {
        let number = AccountNumber::from_sequence(seq).unwrap();
        let text = number.as_string();
        prop_assert_eq!(text.len(), 7);
        prop_assert_eq!(AccountNumber::parse(&text).unwrap(), number);
    }

    /// Property 2: the mapping from sequence values is injective.
    #[test]
    fn prop_no_collisions(a in 1i64..=MAX_SEQUENCE, b in 1i64..=MAX_SEQUENCE) {
        prop_assume!(a != b);
        prop_assert_ne!(
            AccountNumber::from_sequence(a).unwrap(),
            AccountNumber::from_sequence(b).unwrap()
        );
    }

    /// Property 3: Luhn catches every single-digit substitution.
    #[test]
    fn prop_single_digit_error_detected(
        seq in 1i64..=MAX_SEQUENCE,
        position in 0usize..7,
        bump in 1u8..10,
    ) {
        let text = AccountNumber::from_sequence(seq).unwrap().as_string();
        let mut bytes = text.into_bytes();
        bytes[position] = b'0' + (bytes[position] - b'0' + bump) % 10;
        let mutated = String::from_utf8(bytes).unwrap();
        prop_assert_eq!(
            AccountNumber::parse(&mutated),
            Err(AccountNumberError::BadCheckDigit)
        );
    }
}
