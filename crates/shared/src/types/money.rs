//! Money type with decimal precision and currency.
//!
//! Never use floating-point for money. Ledger columns are NUMERIC(19,4), so
//! an amount may carry at most four decimal places.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Decimal places a ledger amount may carry.
pub const LEDGER_SCALE: u32 = 4;

/// Represents a monetary amount with currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount in major units.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

/// ISO 4217 currency codes supported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// Japanese Yen
    Jpy,
    /// US Dollar
    Usd,
    /// Euro
    Eur,
}

impl Money {
    /// Creates a new Money instance.
    #[must_use]
    pub const fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Creates a zero amount in the specified currency.
    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self {
            amount: Decimal::ZERO,
            currency,
        }
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Returns true if the amount can be stored without rounding.
    #[must_use]
    pub fn fits_ledger_scale(&self) -> bool {
        self.amount.normalize().scale() <= LEDGER_SCALE
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount.normalize(), self.currency)
    }
}

impl Currency {
    /// Returns the ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Jpy => "JPY",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "JPY" => Ok(Self::Jpy),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            _ => Err(format!("Unknown currency: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn test_positive() {
        assert!(Money::new(dec!(0.0001), Currency::Jpy).is_positive());
        assert!(!Money::zero(Currency::Jpy).is_positive());
        assert!(!Money::new(dec!(-5), Currency::Jpy).is_positive());
    }

    #[test]
    fn test_ledger_scale() {
        assert!(Money::new(dec!(10.1234), Currency::Usd).fits_ledger_scale());
        assert!(Money::new(dec!(10.12340000), Currency::Usd).fits_ledger_scale());
        assert!(!Money::new(dec!(10.12345), Currency::Usd).fits_ledger_scale());
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::new(dec!(3000.00), Currency::Jpy).to_string(), "3000 JPY");
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!(Currency::from_str("JPY").unwrap(), Currency::Jpy);
        assert_eq!(Currency::from_str("jpy").unwrap(), Currency::Jpy);
        assert_eq!(Currency::from_str("JPY ").unwrap(), Currency::Jpy);
        assert_eq!(Currency::from_str("EUR").unwrap(), Currency::Eur);
        assert!(Currency::from_str("XXX").is_err());
        assert!(Currency::from_str("").is_err());
    }
}
