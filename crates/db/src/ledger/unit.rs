//! Opening a unit of work.

use kinko_core::ledger::LedgerError;
use kinko_shared::AppConfig;
use kinko_shared::types::Currency;
use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::error::db_err;
use crate::retry::RetryPolicy;

/// Settings shared by every ledger-mutating repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    /// Currency of newly opened accounts.
    pub currency: Currency,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
    /// `lock_timeout` applied to every unit of work.
    pub lock_timeout_ms: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            currency: Currency::Jpy,
            retry: RetryPolicy::default(),
            lock_timeout_ms: 5000,
        }
    }
}

impl LedgerSettings {
    /// Builds the settings from the application config.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the configured currency is not supported.
    pub fn from_config(config: &AppConfig) -> Result<Self, LedgerError> {
        let currency = config
            .ledger
            .currency
            .parse::<Currency>()
            .map_err(LedgerError::Internal)?;
        Ok(Self {
            currency,
            retry: RetryPolicy::from(&config.ledger),
            lock_timeout_ms: config.database.lock_timeout_ms,
        })
    }
}

/// Begins a transaction with the lock timeout set.
///
/// A lock wait past the timeout fails with SQLSTATE 55P03, which the retry
/// loop treats as transient.
pub async fn begin(
    db: &DatabaseConnection,
    settings: &LedgerSettings,
) -> Result<DatabaseTransaction, LedgerError> {
    let txn = db.begin().await.map_err(db_err)?;
    txn.execute_unprepared(&format!(
        "SET LOCAL lock_timeout = '{}ms'",
        settings.lock_timeout_ms
    ))
    .await
    .map_err(db_err)?;
    Ok(txn)
}
