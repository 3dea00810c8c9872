//! Taxation routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use kinko_core::account::AccountRef;
use kinko_core::tax::IncomeSource;
use kinko_db::entities::{customers, tax_assessments};
use kinko_db::repositories::{AssessmentRunReport, RecordedIncome};
use kinko_shared::types::AssessmentId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::BusinessDay;
use crate::{AppState, error::ApiError, middleware::Caller};

/// Creates the tax routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tax/income", post(record_income))
        .route("/tax/source-account", post(register_source_account))
        .route("/tax/assess", post(run_assessment))
        .route("/tax/assessments/{assessment_id}", get(get_assessment))
        .route("/tax/assessments/{assessment_id}/pay", post(pay_assessment))
        .route("/customers/{owner}/tax/assessments", get(list_assessments))
}

/// Request body for recording a taxable event.
#[derive(Debug, Deserialize)]
pub struct RecordIncomeRequest {
    /// Earner.
    pub owner_identity: String,
    /// Kind of income.
    pub source: IncomeSource,
    /// Identifier unique per source; replays are ignored.
    pub source_id: String,
    /// Gross amount. Capital losses are negative.
    pub gross: Decimal,
    /// Date the income was earned. Defaults to today.
    #[serde(default)]
    pub occurred_on: Option<NaiveDate>,
}

/// Request body for registering the tax source account.
#[derive(Debug, Deserialize)]
pub struct SourceAccountRequest {
    /// Customer.
    pub owner_identity: String,
    /// One of the customer's accounts.
    pub account: AccountRef,
}

/// Request body for paying an assessment by hand.
#[derive(Debug, Deserialize)]
pub struct PayAssessmentRequest {
    /// Paying account.
    pub from: AccountRef,
}

/// Assessment list response.
#[derive(Debug, Serialize)]
pub struct AssessmentsResponse {
    /// Newest period first.
    pub assessments: Vec<tax_assessments::Model>,
}

/// POST `/tax/income` - 201 for a new event, 200 for a replay.
async fn record_income(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<RecordIncomeRequest>,
) -> Result<(StatusCode, Json<RecordedIncome>), ApiError> {
    let occurred_on = state.business_date(payload.occurred_on)?;
    let recorded = state
        .tax
        .record_income(
            &payload.owner_identity,
            payload.source,
            &payload.source_id,
            payload.gross,
            occurred_on,
        )
        .await?;
    if recorded.duplicate {
        return Ok((StatusCode::OK, Json(recorded)));
    }
    info!(
        service = caller.service(),
        source_id = %payload.source_id,
        gross = %payload.gross,
        "income recorded"
    );
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// POST `/tax/source-account` - Choose the account assessments are paid from.
async fn register_source_account(
    State(state): State<AppState>,
    Json(payload): Json<SourceAccountRequest>,
) -> Result<Json<customers::Model>, ApiError> {
    let customer = state
        .tax
        .register_tax_source_account(&payload.owner_identity, &payload.account)
        .await?;
    Ok(Json(customer))
}

/// POST `/tax/assess?business_date=` - Assess the week before the date.
async fn run_assessment(
    State(state): State<AppState>,
    caller: Caller,
    Query(day): Query<BusinessDay>,
) -> Result<Json<AssessmentRunReport>, ApiError> {
    let run_date = state.business_date(day.business_date)?;
    let report = state.tax.run_weekly_assessment(run_date).await?;
    info!(service = caller.service(), business_date = %run_date, "tax assessment triggered");
    Ok(Json(report))
}

/// GET `/tax/assessments/{assessment_id}` - One assessment.
async fn get_assessment(
    State(state): State<AppState>,
    Path(assessment_id): Path<AssessmentId>,
) -> Result<Json<tax_assessments::Model>, ApiError> {
    Ok(Json(state.tax.get_assessment(assessment_id).await?))
}

/// POST `/tax/assessments/{assessment_id}/pay` - Pay the remaining amount.
async fn pay_assessment(
    State(state): State<AppState>,
    caller: Caller,
    Path(assessment_id): Path<AssessmentId>,
    Json(payload): Json<PayAssessmentRequest>,
) -> Result<Json<tax_assessments::Model>, ApiError> {
    let assessment = state
        .tax
        .pay_tax_assessment(assessment_id, &payload.from)
        .await?;
    info!(service = caller.service(), assessment_id = %assessment_id, "tax assessment paid");
    Ok(Json(assessment))
}

/// GET `/customers/{owner}/tax/assessments` - The customer's assessments.
async fn list_assessments(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<AssessmentsResponse>, ApiError> {
    let assessments = state.tax.list_assessments(&owner).await?;
    Ok(Json(AssessmentsResponse { assessments }))
}
