//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Database migrations
//! - The ledger unit of work: row locks, posting, retries
//! - Repositories for the account store and every sub-ledger

pub mod entities;
pub mod error;
pub mod ledger;
pub mod migration;
pub mod repositories;
pub mod retry;

pub use ledger::LedgerSettings;
pub use repositories::{
    AccountRepository, ChipRepository, CollectionsRepository, JobRunRepository, LedgerRepository,
    LoanRepository, TaxRepository,
};
pub use retry::RetryPolicy;

use std::time::Duration;

use kinko_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection pool to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);
    Database::connect(options).await
}
