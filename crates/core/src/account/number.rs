//! Account numbers and branch codes.
//!
//! An account number is seven digits: a six-digit value drawn from a database
//! sequence followed by a Luhn check digit. Numbers are unique because the
//! sequence is, so generation never needs a collision check.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest sequence value that still fits in six digits.
pub const MAX_SEQUENCE: i64 = 999_999;

/// Branch that owns the system accounts.
pub const SYSTEM_BRANCH_CODE: &str = "000";

/// Errors for account number and branch code handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountNumberError {
    /// The account number sequence is exhausted (or returned garbage).
    #[error("Account number sequence value {0} is out of range")]
    SequenceOutOfRange(i64),

    /// Input is not seven ASCII digits.
    #[error("Account number must be 7 digits")]
    Malformed,

    /// The check digit does not match.
    #[error("Account number check digit is invalid")]
    BadCheckDigit,

    /// Input is not a three-digit branch code.
    #[error("Branch code must be 3 digits")]
    MalformedBranch,
}

/// A validated seven-digit account number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(u32);

impl AccountNumber {
    /// Builds the account number for a sequence value.
    ///
    /// # Errors
    ///
    /// Returns `SequenceOutOfRange` unless `1 <= seq <= 999_999`.
    pub fn from_sequence(seq: i64) -> Result<Self, AccountNumberError> {
        if !(1..=MAX_SEQUENCE).contains(&seq) {
            return Err(AccountNumberError::SequenceOutOfRange(seq));
        }
        let payload = u32::try_from(seq).map_err(|_| AccountNumberError::SequenceOutOfRange(seq))?;
        Ok(Self(payload * 10 + luhn_check_digit(payload)))
    }

    /// Parses and validates a seven-digit account number.
    ///
    /// # Errors
    ///
    /// Returns `Malformed` or `BadCheckDigit`.
    pub fn parse(s: &str) -> Result<Self, AccountNumberError> {
        if s.len() != 7 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AccountNumberError::Malformed);
        }
        let value: u32 = s.parse().map_err(|_| AccountNumberError::Malformed)?;
        if luhn_check_digit(value / 10) != value % 10 {
            return Err(AccountNumberError::BadCheckDigit);
        }
        Ok(Self(value))
    }

    /// Returns the zero-padded string form.
    #[must_use]
    pub fn as_string(&self) -> String {
        format!("{:07}", self.0)
    }
}

/// Luhn check digit for the six-digit payload.
fn luhn_check_digit(payload: u32) -> u32 {
    let mut sum = 0;
    let mut rest = payload;
    // The rightmost payload digit is doubled because the check digit follows it.
    for position in 0..6 {
        let mut digit = rest % 10;
        rest /= 10;
        if position % 2 == 0 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    (10 - sum % 10) % 10
}

impl std::fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:07}", self.0)
    }
}

impl std::str::FromStr for AccountNumber {
    type Err = AccountNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = AccountNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountNumber> for String {
    fn from(value: AccountNumber) -> Self {
        value.as_string()
    }
}

/// A three-digit branch code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchCode(String);

impl BranchCode {
    /// Validates a branch code.
    ///
    /// # Errors
    ///
    /// Returns `MalformedBranch` unless the input is three ASCII digits.
    pub fn parse(s: &str) -> Result<Self, AccountNumberError> {
        if s.len() == 3 && s.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(s.to_string()))
        } else {
            Err(AccountNumberError::MalformedBranch)
        }
    }

    /// The branch holding system accounts.
    #[must_use]
    pub fn system() -> Self {
        Self(SYSTEM_BRANCH_CODE.to_string())
    }

    /// Returns the code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BranchCode {
    type Error = AccountNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BranchCode> for String {
    fn from(value: BranchCode) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_from_sequence_pads_and_appends_check_digit() {
        let number = AccountNumber::from_sequence(1).unwrap();
        assert_eq!(number.as_string().len(), 7);
        assert!(number.as_string().starts_with("000001"));
        assert_eq!(AccountNumber::parse(&number.as_string()).unwrap(), number);
    }

    #[test]
    fn test_known_luhn_value() {
        assert_eq!(luhn_check_digit(123_456), 6);
        assert_eq!(AccountNumber::from_sequence(123_456).unwrap().as_string(), "1234566");
        assert!(AccountNumber::parse("1234566").is_ok());
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(1_000_000)]
    fn test_sequence_out_of_range(#[case] seq: i64) {
        assert_eq!(
            AccountNumber::from_sequence(seq),
            Err(AccountNumberError::SequenceOutOfRange(seq))
        );
    }

    #[rstest]
    #[case("123456")]
    #[case("12345678")]
    #[case("12a4567")]
    #[case("")]
    fn test_malformed(#[case] input: &str) {
        assert_eq!(AccountNumber::parse(input), Err(AccountNumberError::Malformed));
    }

    #[test]
    fn test_bad_check_digit() {
        let good = AccountNumber::from_sequence(123_456).unwrap().as_string();
        let last = good.as_bytes()[6] - b'0';
        let bad = format!("{}{}", &good[..6], (last + 1) % 10);
        assert_eq!(AccountNumber::parse(&bad), Err(AccountNumberError::BadCheckDigit));
    }

    #[test]
    fn test_branch_code() {
        assert!(BranchCode::parse("001").is_ok());
        assert_eq!(BranchCode::system().as_str(), "000");
        assert!(BranchCode::parse("01").is_err());
        assert!(BranchCode::parse("abc").is_err());
    }
}
