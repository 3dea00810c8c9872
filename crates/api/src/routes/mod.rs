//! API route definitions.

use axum::{Router, middleware};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{AppState, middleware::auth_middleware};

pub mod accounts;
pub mod chips;
pub mod collections;
pub mod health;
pub mod loans;
pub mod tax;
pub mod transactions;

/// Optional business date for scheduled jobs triggered by hand.
#[derive(Debug, Default, Deserialize)]
pub struct BusinessDay {
    /// Business date to run for. Defaults to today in the scheduler zone.
    #[serde(default)]
    pub business_date: Option<NaiveDate>,
}

/// Creates the API router with protected routes that need state for middleware.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(accounts::routes())
        .merge(transactions::routes())
        .merge(chips::routes())
        .merge(loans::routes())
        .merge(tax::routes())
        .merge(collections::routes())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(health::routes())
        .merge(protected_routes)
}
