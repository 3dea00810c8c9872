//! Liveness endpoint.

use axum::{Json, Router, extract::State, routing::get};
use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Current business date, if the configured time zone is valid.
    pub business_date: Option<NaiveDate>,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        business_date: state.scheduler.business_date(Utc::now()).ok(),
    })
}

/// Creates health check routes. These are public.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
