//! Row to domain conversions.

use chrono::Utc;
use kinko_core::ledger::{
    AccountSnapshot, Direction, EntryRecord, LedgerError, TransactionRecord, TransactionSummary,
};
use kinko_shared::types::{AccountId, Currency, TransactionId};

use crate::entities::{accounts, transaction_entries, transactions};

/// Parses a stored currency code.
///
/// # Errors
///
/// Returns `Internal` for a code the ledger does not know.
pub fn parse_currency(code: &str) -> Result<Currency, LedgerError> {
    code.parse::<Currency>().map_err(LedgerError::Internal)
}

/// Snapshot of a locked account row.
///
/// # Errors
///
/// Returns `Internal` if the stored currency is unknown.
pub fn snapshot(model: &accounts::Model) -> Result<AccountSnapshot, LedgerError> {
    Ok(AccountSnapshot {
        id: AccountId::from_uuid(model.id),
        currency: parse_currency(&model.currency)?,
        status: model.status.into(),
        balance: model.balance,
    })
}

/// Transaction header as a domain record.
///
/// # Errors
///
/// Returns `Internal` if the stored currency is unknown.
pub fn transaction_record(model: transactions::Model) -> Result<TransactionRecord, LedgerError> {
    Ok(TransactionRecord {
        id: TransactionId::from_uuid(model.id),
        transaction_type: model.transaction_type.into(),
        status: model.status.into(),
        from_account_id: model.from_account_id.map(AccountId::from_uuid),
        to_account_id: model.to_account_id.map(AccountId::from_uuid),
        amount: model.amount,
        currency: parse_currency(&model.currency)?,
        description: model.description,
        reverses_transaction_id: model.reverses_transaction_id.map(TransactionId::from_uuid),
        executed_at: model.executed_at.with_timezone(&Utc),
    })
}

/// Entry row as a domain record.
#[must_use]
pub fn entry_record(model: transaction_entries::Model) -> EntryRecord {
    EntryRecord {
        id: model.id,
        account_id: AccountId::from_uuid(model.account_id),
        entry_type: model.entry_type.into(),
        amount: model.amount,
    }
}

/// A transaction as seen from one of its accounts.
///
/// # Errors
///
/// Returns `Internal` if the stored currency is unknown.
pub fn summary(
    model: transactions::Model,
    account: AccountId,
) -> Result<TransactionSummary, LedgerError> {
    let record = transaction_record(model)?;
    let (direction, counterparty) = if record.from_account_id == Some(account) {
        (Direction::Debit, record.to_account_id)
    } else {
        (Direction::Credit, record.from_account_id)
    };
    Ok(TransactionSummary {
        transaction_id: record.id,
        transaction_type: record.transaction_type,
        status: record.status,
        direction,
        amount: record.amount,
        currency: record.currency,
        counterparty_account_id: counterparty,
        description: record.description,
        executed_at: record.executed_at,
    })
}
