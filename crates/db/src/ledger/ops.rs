//! Ledger operations inside a caller-owned transaction.
//!
//! Each function resolves references, locks the rows it touches, plans the
//! movement with `LedgerService` and posts it. Nothing commits here.

use kinko_core::account::AccountRef;
use kinko_core::ledger::{
    AccountSnapshot, BatchOutcome, BatchTransferRequest, LedgerError, LedgerService,
    MovementRequest, TransactionRecord, TransferRequest,
};
use kinko_shared::types::{AccountId, TransactionId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, PaginatorTrait,
    QueryFilter, QuerySelect, Set,
};
use uuid::Uuid;

use super::convert::transaction_record;
use super::lock::{lock_accounts, resolve, resolve_all};
use super::posting::post;
use crate::entities::{
    chip_transactions, collection_seizures, loan_payments, loans,
    sea_orm_active_enums::TransactionStatus, tax_assessments, transactions,
};
use crate::error::db_err;

/// Two-sided transfer.
///
/// # Errors
///
/// Returns the `LedgerService` rejection, `AccountNotFound`, or a database failure.
pub async fn transfer<C: ConnectionTrait>(
    conn: &C,
    request: &TransferRequest,
) -> Result<TransactionRecord, LedgerError> {
    let from = resolve(conn, &request.from).await?;
    let to = resolve(conn, &request.to).await?;
    let locked = lock_accounts(conn, [from, to]).await?;

    let plan = LedgerService::plan_transfer(request, locked.get(from)?, locked.get(to)?)
        .inspect_err(|e| tracing::warn!(from = %from, to = %to, error = %e, "transfer rejected"))?;
    post(conn, &plan).await
}

/// Single-sided deposit.
///
/// # Errors
///
/// Returns the `LedgerService` rejection, `AccountNotFound`, or a database failure.
pub async fn deposit<C: ConnectionTrait>(
    conn: &C,
    request: &MovementRequest,
) -> Result<TransactionRecord, LedgerError> {
    let id = resolve(conn, &request.account).await?;
    let locked = lock_accounts(conn, [id]).await?;
    let plan = LedgerService::plan_deposit(request, locked.get(id)?)
        .inspect_err(|e| tracing::warn!(account_id = %id, error = %e, "deposit rejected"))?;
    post(conn, &plan).await
}

/// Single-sided withdrawal.
///
/// # Errors
///
/// Returns the `LedgerService` rejection, `AccountNotFound`, or a database failure.
pub async fn withdraw<C: ConnectionTrait>(
    conn: &C,
    request: &MovementRequest,
) -> Result<TransactionRecord, LedgerError> {
    let id = resolve(conn, &request.account).await?;
    let locked = lock_accounts(conn, [id]).await?;
    let plan = LedgerService::plan_withdrawal(request, locked.get(id)?)
        .inspect_err(|e| tracing::warn!(account_id = %id, error = %e, "withdrawal rejected"))?;
    post(conn, &plan).await
}

/// All-or-nothing batch.
///
/// Every leg and the counterparty are locked up front in one ordered pass.
/// When any leg fails the outcome lists every failure and nothing is
/// posted; the caller must then roll back.
///
/// # Errors
///
/// Returns an error only for an unresolvable counterparty or a database
/// failure. Leg failures are reported in the outcome.
pub async fn batch<C: ConnectionTrait>(
    conn: &C,
    request: &BatchTransferRequest,
) -> Result<BatchOutcome, LedgerError> {
    let counterparty = match &request.counterparty {
        Some(reference) => Some(resolve(conn, reference).await?),
        None => None,
    };
    let references: Vec<&AccountRef> = request.legs.iter().map(|l| &l.account).collect();
    let legs = resolve_all(conn, references).await?;

    let ids: Vec<AccountId> = legs
        .iter()
        .filter_map(|r| r.as_ref().ok().copied())
        .chain(counterparty)
        .collect();
    let locked = lock_accounts(conn, ids).await?;

    let counterparty = counterparty.map(|id| locked.get(id)).transpose()?;
    let snapshots: Vec<Result<AccountSnapshot, LedgerError>> = legs
        .into_iter()
        .map(|leg| leg.and_then(|id| locked.get(id).cloned()))
        .collect();

    match LedgerService::plan_batch(request, &snapshots, counterparty) {
        Ok(plans) => {
            let mut succeeded = Vec::with_capacity(plans.len());
            for plan in &plans {
                succeeded.push(post(conn, plan).await?);
            }
            Ok(BatchOutcome {
                succeeded,
                failed: Vec::new(),
            })
        }
        Err(failed) => {
            tracing::warn!(failed_legs = failed.len(), legs = request.legs.len(), "batch rejected");
            Ok(BatchOutcome {
                succeeded: Vec::new(),
                failed,
            })
        }
    }
}

/// Posts the offsetting transaction and marks the original reversed.
///
/// Transactions a sub-ledger row points at are not reversible: the cash
/// would come back while the chips, loan or tax effect stayed.
///
/// # Errors
///
/// Returns `TransactionNotFound`, `NotReversible`, a `LedgerService`
/// rejection of the offsetting movement, or a database failure.
pub async fn reverse<C: ConnectionTrait>(
    conn: &C,
    id: TransactionId,
    reason: &str,
) -> Result<TransactionRecord, LedgerError> {
    let original = transactions::Entity::find_by_id(id.into_inner())
        .lock_exclusive()
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or(LedgerError::TransactionNotFound(id))?;
    let record = transaction_record(original.clone())?;
    if backs_sub_ledger(conn, id.into_inner()).await? {
        tracing::warn!(transaction_id = %id, "reversal rejected: sub-ledger movement");
        return Err(LedgerError::NotReversible(id));
    }

    let ids = record.from_account_id.into_iter().chain(record.to_account_id);
    let locked = lock_accounts(conn, ids).await?;
    let debit_side = record.to_account_id.map(|a| locked.get(a)).transpose()?;
    let credit_side = record.from_account_id.map(|a| locked.get(a)).transpose()?;

    let plan = LedgerService::plan_reversal(&record, debit_side, credit_side, reason)
        .inspect_err(|e| tracing::warn!(transaction_id = %id, error = %e, "reversal rejected"))?;
    let reversal = post(conn, &plan).await?;

    let mut original = original.into_active_model();
    original.status = Set(TransactionStatus::Reversed);
    original.update(conn).await.map_err(db_err)?;

    tracing::info!(transaction_id = %id, reversal_id = %reversal.id, "reversed transaction");
    Ok(reversal)
}

/// True if a chip, loan, tax or seizure row references the transaction.
async fn backs_sub_ledger<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<bool, LedgerError> {
    let counts = [
        chip_transactions::Entity::find()
            .filter(chip_transactions::Column::LedgerTransactionId.eq(id))
            .count(conn)
            .await,
        loans::Entity::find()
            .filter(loans::Column::DisbursementTransactionId.eq(id))
            .count(conn)
            .await,
        loan_payments::Entity::find()
            .filter(loan_payments::Column::LedgerTransactionId.eq(id))
            .count(conn)
            .await,
        tax_assessments::Entity::find()
            .filter(tax_assessments::Column::PaymentTransactionId.eq(id))
            .count(conn)
            .await,
        collection_seizures::Entity::find()
            .filter(collection_seizures::Column::LedgerTransactionId.eq(id))
            .count(conn)
            .await,
    ];
    for count in counts {
        if count.map_err(db_err)? > 0 {
            return Ok(true);
        }
    }
    Ok(false)
}
