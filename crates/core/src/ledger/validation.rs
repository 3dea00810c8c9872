//! Business rule validation for ledger operations.

use kinko_shared::types::{Currency, Money};
use rust_decimal::Decimal;
use thiserror::Error;

use super::entry::{EntryType, PlannedEntry};
use super::error::LedgerError;
use super::types::{AccountSnapshot, Initiator};

/// Entry-shape violations. The database enforces the same rule at commit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerValidationError {
    /// Two-sided transaction entries do not balance.
    #[error("Transaction is unbalanced: debits ({debits}) != credits ({credits})")]
    Unbalanced {
        /// Total debit amount.
        debits: Decimal,
        /// Total credit amount.
        credits: Decimal,
    },

    /// Wrong number of entries for the transaction shape.
    #[error("Expected {expected} entries, found {found}")]
    WrongEntryCount {
        /// Entries the shape requires.
        expected: usize,
        /// Entries present.
        found: usize,
    },

    /// A two-sided transaction must have one debit and one credit.
    #[error("Transaction must have one debit and one credit entry")]
    SingleSided,

    /// Entry amount is zero or negative.
    #[error("Entry amount must be positive")]
    InvalidAmount,
}

/// Validates the entries of a single transaction.
///
/// Two-sided: exactly one debit and one credit of equal amount. Single-sided:
/// exactly one entry.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn validate_entries(
    entries: &[PlannedEntry],
    two_sided: bool,
) -> Result<(), LedgerValidationError> {
    let expected = if two_sided { 2 } else { 1 };
    if entries.len() != expected {
        return Err(LedgerValidationError::WrongEntryCount {
            expected,
            found: entries.len(),
        });
    }

    let mut debits = Decimal::ZERO;
    let mut credits = Decimal::ZERO;
    let mut has_debit = false;
    let mut has_credit = false;

    for entry in entries {
        if entry.amount <= Decimal::ZERO {
            return Err(LedgerValidationError::InvalidAmount);
        }
        match entry.entry_type {
            EntryType::Debit => {
                debits += entry.amount;
                has_debit = true;
            }
            EntryType::Credit => {
                credits += entry.amount;
                has_credit = true;
            }
        }
    }

    if two_sided {
        if !has_debit || !has_credit {
            return Err(LedgerValidationError::SingleSided);
        }
        if debits != credits {
            return Err(LedgerValidationError::Unbalanced { debits, credits });
        }
    }

    Ok(())
}

/// Largest amount or balance the ledger stores. The `NUMERIC(19, 4)`
/// columns hold values below 10^15.
pub const MAX_LEDGER_AMOUNT: Decimal = Decimal::from_parts(0xA4C6_7FFF, 0x0003_8D7E, 0, false, 0); // 999_999_999_999_999

/// Validates a requested amount.
///
/// # Errors
///
/// Returns `InvalidAmount` unless the amount is positive, at most
/// `MAX_LEDGER_AMOUNT` and has at most four decimal places.
pub fn validate_amount(amount: Decimal, currency: Currency) -> Result<Money, LedgerError> {
    let money = Money::new(amount, currency);
    if !money.is_positive() || !money.fits_ledger_scale() || amount > MAX_LEDGER_AMOUNT {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok(money)
}

/// Checks that `account` may be debited `amount` with the given balance.
///
/// `available` is the running balance, which for batches differs from the
/// snapshot balance.
///
/// # Errors
///
/// Returns `AccountNotUsable`, `CurrencyMismatch` or `InsufficientFunds`.
pub fn check_debit(
    account: &AccountSnapshot,
    money: Money,
    available: Decimal,
    initiator: Initiator,
) -> Result<(), LedgerError> {
    if !account.status.can_debit(initiator) {
        return Err(LedgerError::AccountNotUsable {
            account: account.id,
            status: account.status,
        });
    }
    check_currency(account, money.currency)?;
    if available < money.amount {
        return Err(LedgerError::InsufficientFunds {
            account: account.id,
            available,
            requested: money.amount,
        });
    }
    Ok(())
}

/// Checks that `account` may be credited `money` on top of `balance`.
///
/// `balance` is the running balance, as for `check_debit`.
///
/// # Errors
///
/// Returns `AccountNotUsable`, `CurrencyMismatch`, or `InvalidAmount` when
/// the resulting balance would exceed `MAX_LEDGER_AMOUNT`.
pub fn check_credit(
    account: &AccountSnapshot,
    money: Money,
    balance: Decimal,
) -> Result<(), LedgerError> {
    if !account.status.can_receive_credit() {
        return Err(LedgerError::AccountNotUsable {
            account: account.id,
            status: account.status,
        });
    }
    check_currency(account, money.currency)?;
    match balance.checked_add(money.amount) {
        Some(total) if total <= MAX_LEDGER_AMOUNT => Ok(()),
        _ => Err(LedgerError::InvalidAmount(money.amount)),
    }
}

fn check_currency(account: &AccountSnapshot, currency: Currency) -> Result<(), LedgerError> {
    if account.currency == currency {
        Ok(())
    } else {
        Err(LedgerError::CurrencyMismatch {
            expected: account.currency,
            actual: currency,
        })
    }
}
