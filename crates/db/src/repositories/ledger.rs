//! Ledger repository: the public face of the ledger engine.

use kinko_core::account::AccountRef;
use kinko_core::ledger::{
    BatchOutcome, BatchTransferRequest, LedgerError, LedgerService, MovementRequest,
    TransactionDetail, TransactionRecord, TransactionSummary, TransferRequest,
};
use kinko_shared::types::TransactionId;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};

use crate::entities::{accounts, transaction_entries, transactions};
use crate::error::db_err;
use crate::ledger::{self, LedgerSettings};
use crate::retry;

/// Repository for ledger operations.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    db: DatabaseConnection,
    settings: LedgerSettings,
}

impl LedgerRepository {
    /// Creates a new ledger repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, settings: LedgerSettings) -> Self {
        Self { db, settings }
    }

    /// Moves money between two accounts.
    pub async fn transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<TransactionRecord, LedgerError> {
        retry::run(&self.settings.retry, "transfer", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let record = ledger::transfer(&txn, request).await?;
            txn.commit().await.map_err(db_err)?;
            Ok(record)
        })
        .await
    }

    /// Credits an account from outside the ledger.
    pub async fn deposit(
        &self,
        request: &MovementRequest,
    ) -> Result<TransactionRecord, LedgerError> {
        retry::run(&self.settings.retry, "deposit", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let record = ledger::deposit(&txn, request).await?;
            txn.commit().await.map_err(db_err)?;
            Ok(record)
        })
        .await
    }

    /// Debits an account to outside the ledger.
    pub async fn withdraw(
        &self,
        request: &MovementRequest,
    ) -> Result<TransactionRecord, LedgerError> {
        retry::run(&self.settings.retry, "withdraw", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let record = ledger::withdraw(&txn, request).await?;
            txn.commit().await.map_err(db_err)?;
            Ok(record)
        })
        .await
    }

    /// Applies every leg of the batch or none.
    ///
    /// A rejected batch is returned as an outcome listing every failing leg;
    /// its transaction is rolled back.
    pub async fn batch_transfer(
        &self,
        request: &BatchTransferRequest,
    ) -> Result<BatchOutcome, LedgerError> {
        retry::run(&self.settings.retry, "batch_transfer", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let outcome = ledger::batch(&txn, request).await?;
            if outcome.is_applied() {
                txn.commit().await.map_err(db_err)?;
            } else {
                txn.rollback().await.map_err(db_err)?;
            }
            Ok(outcome)
        })
        .await
    }

    /// Offsets a completed transaction and marks it reversed.
    pub async fn reverse_transaction(
        &self,
        id: TransactionId,
        reason: &str,
    ) -> Result<TransactionRecord, LedgerError> {
        retry::run(&self.settings.retry, "reverse_transaction", || async move {
            let txn = ledger::begin(&self.db, &self.settings).await?;
            let record = ledger::reverse(&txn, id, reason).await?;
            txn.commit().await.map_err(db_err)?;
            Ok(record)
        })
        .await
    }

    /// A transaction with its entries.
    pub async fn get_transaction(
        &self,
        id: TransactionId,
    ) -> Result<TransactionDetail, LedgerError> {
        let header = transactions::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(LedgerError::TransactionNotFound(id))?;

        let entries = transaction_entries::Entity::find()
            .filter(transaction_entries::Column::TransactionId.eq(id.into_inner()))
            .order_by_asc(transaction_entries::Column::EntryType)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(TransactionDetail {
            transaction: ledger::transaction_record(header)?,
            entries: entries.into_iter().map(ledger::entry_record).collect(),
        })
    }

    /// Most recent transactions touching an account, newest first.
    pub async fn get_transaction_history(
        &self,
        account: &AccountRef,
        limit: Option<u64>,
    ) -> Result<Vec<TransactionSummary>, LedgerError> {
        let account_id = ledger::resolve(&self.db, account).await?;
        accounts::Entity::find_by_id(account_id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))?;

        let id = account_id.into_inner();
        let rows = transactions::Entity::find()
            .filter(
                Condition::any()
                    .add(transactions::Column::FromAccountId.eq(id))
                    .add(transactions::Column::ToAccountId.eq(id)),
            )
            .order_by_desc(transactions::Column::ExecutedAt)
            .order_by_desc(transactions::Column::Id)
            .limit(LedgerService::history_limit(limit))
            .all(&self.db)
            .await
            .map_err(db_err)?;

        rows.into_iter()
            .map(|row| ledger::summary(row, account_id))
            .collect()
    }
}
