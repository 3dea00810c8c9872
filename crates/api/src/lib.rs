//! HTTP API for Kinko collaborators.
//!
//! This crate provides:
//! - REST routes over every repository
//! - Service-token middleware
//! - Mapping of domain errors to JSON error bodies

pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use chrono::{NaiveDate, Utc};
use kinko_core::chips::ChipPolicy;
use kinko_core::collections::CollectionsPolicy;
use kinko_core::ledger::LedgerError;
use kinko_core::loans::LoanPolicy;
use kinko_core::tax::TaxPolicy;
use kinko_db::{
    AccountRepository, ChipRepository, CollectionsRepository, LedgerRepository, LedgerSettings,
    LoanRepository, TaxRepository,
};
use kinko_shared::config::SchedulerConfig;
use kinko_shared::{AppConfig, JwtService};
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Account store.
    pub accounts: Arc<AccountRepository>,
    /// Ledger engine.
    pub ledger: Arc<LedgerRepository>,
    /// Chip sub-ledger.
    pub chips: Arc<ChipRepository>,
    /// Loans.
    pub loans: Arc<LoanRepository>,
    /// Taxation.
    pub tax: Arc<TaxRepository>,
    /// Collections.
    pub collections: Arc<CollectionsRepository>,
    /// JWT service for service tokens.
    pub jwt_service: Arc<JwtService>,
    /// Business-day calendar.
    pub scheduler: Arc<SchedulerConfig>,
}

impl AppState {
    /// Builds every repository over one connection pool.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the configured ledger currency is unsupported.
    pub fn new(
        db: DatabaseConnection,
        config: &AppConfig,
        jwt_service: JwtService,
    ) -> Result<Self, LedgerError> {
        let settings = LedgerSettings::from_config(config)?;
        Ok(Self {
            accounts: Arc::new(AccountRepository::new(db.clone(), settings)),
            ledger: Arc::new(LedgerRepository::new(db.clone(), settings)),
            chips: Arc::new(ChipRepository::new(
                db.clone(),
                settings,
                ChipPolicy::from(&config.chips),
            )),
            loans: Arc::new(LoanRepository::new(
                db.clone(),
                settings,
                LoanPolicy::from(&config.loans),
            )),
            tax: Arc::new(TaxRepository::new(
                db.clone(),
                settings,
                TaxPolicy::from(&config.tax),
            )),
            collections: Arc::new(CollectionsRepository::new(
                db,
                settings,
                CollectionsPolicy::from(&config.collections),
            )),
            jwt_service: Arc::new(jwt_service),
            scheduler: Arc::new(config.scheduler.clone()),
        })
    }

    /// Today's business date, or `requested` when a caller pins one.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the configured time zone is unknown.
    pub fn business_date(&self, requested: Option<NaiveDate>) -> Result<NaiveDate, ApiError> {
        match requested {
            Some(date) => Ok(date),
            None => self
                .scheduler
                .business_date(Utc::now())
                .map_err(|e| ApiError::from(LedgerError::Internal(e))),
        }
    }
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
