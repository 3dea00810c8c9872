//! Loan routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use kinko_core::account::AccountRef;
use kinko_core::loans::BorrowRequest;
use kinko_db::entities::{loan_payments, loans};
use kinko_db::repositories::MaintenanceReport;
use kinko_shared::types::LoanId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::BusinessDay;
use crate::{AppState, error::ApiError, middleware::Caller};

/// Creates the loan routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/loans", post(borrow))
        .route("/loans/maintenance", post(run_maintenance))
        .route("/loans/{loan_id}", get(get_loan))
        .route("/loans/{loan_id}/repay", post(repay))
        .route("/loans/{loan_id}/payments", get(list_payments))
        .route("/customers/{owner}/loan", get(get_active_loan))
}

/// Request body for a manual repayment.
#[derive(Debug, Deserialize)]
pub struct RepayRequest {
    /// Amount, a multiple of the repayment unit.
    pub amount: Decimal,
    /// Paying account. Defaults to the loan's autopay account.
    #[serde(default)]
    pub from: Option<AccountRef>,
}

/// Payment history response.
#[derive(Debug, Serialize)]
pub struct PaymentsResponse {
    /// Oldest first.
    pub payments: Vec<loan_payments::Model>,
}

/// Active loan lookup response.
#[derive(Debug, Serialize)]
pub struct ActiveLoanResponse {
    /// The customer's active loan, if any.
    pub loan: Option<loans::Model>,
}

/// POST `/loans?business_date=` - Borrow against recent income.
async fn borrow(
    State(state): State<AppState>,
    caller: Caller,
    Query(day): Query<BusinessDay>,
    Json(payload): Json<BorrowRequest>,
) -> Result<(StatusCode, Json<loans::Model>), ApiError> {
    let today = state.business_date(day.business_date)?;
    let loan = state.loans.borrow(&payload, today).await?;
    info!(
        service = caller.service(),
        loan_id = %loan.id,
        principal = %loan.principal,
        "loan disbursed"
    );
    Ok((StatusCode::CREATED, Json(loan)))
}

/// POST `/loans/{loan_id}/repay?business_date=` - Pay down a loan.
async fn repay(
    State(state): State<AppState>,
    caller: Caller,
    Path(loan_id): Path<LoanId>,
    Query(day): Query<BusinessDay>,
    Json(payload): Json<RepayRequest>,
) -> Result<Json<loans::Model>, ApiError> {
    let today = state.business_date(day.business_date)?;
    let loan = state
        .loans
        .repay(loan_id, payload.amount, payload.from.as_ref(), today)
        .await?;
    info!(service = caller.service(), loan_id = %loan_id, amount = %payload.amount, "loan repaid");
    Ok(Json(loan))
}

/// GET `/loans/{loan_id}` - One loan.
async fn get_loan(
    State(state): State<AppState>,
    Path(loan_id): Path<LoanId>,
) -> Result<Json<loans::Model>, ApiError> {
    Ok(Json(state.loans.get_loan(loan_id).await?))
}

/// GET `/loans/{loan_id}/payments` - Every payment attempt.
async fn list_payments(
    State(state): State<AppState>,
    Path(loan_id): Path<LoanId>,
) -> Result<Json<PaymentsResponse>, ApiError> {
    let payments = state.loans.list_payments(loan_id).await?;
    Ok(Json(PaymentsResponse { payments }))
}

/// GET `/customers/{owner}/loan` - The customer's active loan.
async fn get_active_loan(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<ActiveLoanResponse>, ApiError> {
    let loan = state.loans.get_active_loan(&owner).await?;
    Ok(Json(ActiveLoanResponse { loan }))
}

/// POST `/loans/maintenance?business_date=` - Run daily maintenance now.
async fn run_maintenance(
    State(state): State<AppState>,
    caller: Caller,
    Query(day): Query<BusinessDay>,
) -> Result<Json<MaintenanceReport>, ApiError> {
    let today = state.business_date(day.business_date)?;
    let report = state.loans.run_daily_maintenance(today).await?;
    info!(service = caller.service(), business_date = %today, "loan maintenance triggered");
    Ok(Json(report))
}
