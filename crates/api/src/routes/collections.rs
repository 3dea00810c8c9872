//! Collections routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use kinko_db::entities::{collection_seizures, collections_cases};
use kinko_db::repositories::SweepReport;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::BusinessDay;
use crate::{AppState, error::ApiError, middleware::Caller};

/// Creates the collections routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/collections/sweep", post(run_sweep))
        .route("/collections/cases/{case_id}/seizures", get(list_seizures))
        .route("/customers/{owner}/collections", get(list_cases))
}

/// Case list response.
#[derive(Debug, Serialize)]
pub struct CasesResponse {
    /// Newest first.
    pub cases: Vec<collections_cases::Model>,
}

/// Seizure list response.
#[derive(Debug, Serialize)]
pub struct SeizuresResponse {
    /// Oldest first.
    pub seizures: Vec<collection_seizures::Model>,
}

/// POST `/collections/sweep?business_date=` - Escalate and seize now.
async fn run_sweep(
    State(state): State<AppState>,
    caller: Caller,
    Query(day): Query<BusinessDay>,
) -> Result<Json<SweepReport>, ApiError> {
    let today = state.business_date(day.business_date)?;
    let report = state.collections.sweep(today).await?;
    info!(
        service = caller.service(),
        business_date = %today,
        seizures = report.seizures.len(),
        "collections sweep triggered"
    );
    Ok(Json(report))
}

/// GET `/customers/{owner}/collections` - Every case of the customer.
async fn list_cases(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<CasesResponse>, ApiError> {
    let cases = state.collections.list_cases(&owner).await?;
    Ok(Json(CasesResponse { cases }))
}

/// GET `/collections/cases/{case_id}/seizures` - Debits booked against a case.
async fn list_seizures(
    State(state): State<AppState>,
    Path(case_id): Path<Uuid>,
) -> Result<Json<SeizuresResponse>, ApiError> {
    let seizures = state.collections.list_seizures(case_id).await?;
    Ok(Json(SeizuresResponse { seizures }))
}
