//! Persisting a posting plan.

use kinko_core::ledger::{LedgerError, PostingPlan, TransactionRecord, validate_entries};
use kinko_shared::types::{AccountId, TransactionId};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use super::convert::transaction_record;
use crate::entities::{
    accounts, sea_orm_active_enums::TransactionStatus, transaction_entries, transactions,
};
use crate::error::db_err;

/// Writes the transaction header, its entries and the balance changes.
///
/// The caller must hold the row locks of every account in the plan and must
/// have checked the plan against the locked snapshots.
///
/// # Errors
///
/// Returns `Internal` for a malformed plan and any database failure.
pub async fn post<C: ConnectionTrait>(
    conn: &C,
    plan: &PostingPlan,
) -> Result<TransactionRecord, LedgerError> {
    validate_entries(&plan.entries, plan.transaction_type.is_two_sided())
        .map_err(|e| LedgerError::Internal(e.to_string()))?;

    let transaction_id = TransactionId::new().into_inner();
    let header = transactions::ActiveModel {
        id: Set(transaction_id),
        transaction_type: Set(plan.transaction_type.into()),
        status: Set(TransactionStatus::Completed),
        from_account_id: Set(plan.from_account_id.map(AccountId::into_inner)),
        to_account_id: Set(plan.to_account_id.map(AccountId::into_inner)),
        amount: Set(plan.amount),
        currency: Set(plan.currency.code().to_string()),
        description: Set(plan.description.clone()),
        reverses_transaction_id: Set(plan.reverses.map(TransactionId::into_inner)),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(db_err)?;

    for entry in &plan.entries {
        transaction_entries::ActiveModel {
            id: Set(Uuid::now_v7()),
            transaction_id: Set(transaction_id),
            account_id: Set(entry.account_id.into_inner()),
            entry_type: Set(entry.entry_type.into()),
            amount: Set(entry.amount),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(db_err)?;
    }

    for (account_id, delta) in plan.balance_changes() {
        accounts::Entity::update_many()
            .col_expr(
                accounts::Column::Balance,
                Expr::col(accounts::Column::Balance).add(delta),
            )
            .col_expr(accounts::Column::UpdatedAt, Expr::current_timestamp().into())
            .filter(accounts::Column::Id.eq(account_id.into_inner()))
            .exec(conn)
            .await
            .map_err(db_err)?;
    }

    let record = transaction_record(header)?;
    tracing::info!(
        transaction_id = %record.id,
        transaction_type = ?record.transaction_type,
        amount = %record.amount,
        currency = %record.currency,
        "posted transaction"
    );
    Ok(record)
}
