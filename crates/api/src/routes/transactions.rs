//! Ledger engine routes: transfers, movements, batches and reversals.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use kinko_core::account::AccountRef;
use kinko_core::ledger::{
    BatchTransferRequest, Initiator, MovementRequest, TransactionDetail, TransactionRecord,
    TransferRequest,
};
use kinko_shared::types::TransactionId;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppState, error::ApiError, middleware::Caller};

/// Creates the ledger routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transfers", post(transfer))
        .route("/deposits", post(deposit))
        .route("/withdrawals", post(withdraw))
        .route("/batch-transfers", post(batch_transfer))
        .route("/transactions/{transaction_id}", get(get_transaction))
        .route("/transactions/{transaction_id}/reverse", post(reverse_transaction))
}

/// Request body for a reversal.
#[derive(Debug, Deserialize)]
pub struct ReverseRequest {
    /// Why the transaction is reversed.
    pub reason: String,
}

/// Outcome of a deposit or withdrawal.
#[derive(Debug, Serialize)]
pub struct MovementResponse {
    /// Always true; rejected movements answer with an error body.
    pub success: bool,
    /// The posted transaction.
    pub transaction: TransactionRecord,
}

/// One failing leg of a rejected batch.
#[derive(Debug, Serialize)]
pub struct LegFailureResponse {
    /// Position of the leg in the request.
    pub index: usize,
    /// The leg's account.
    pub account: AccountRef,
    /// Error code.
    pub error: &'static str,
    /// User message.
    pub message: String,
}

/// POST `/transfers` - Move money between two accounts.
async fn transfer(
    State(state): State<AppState>,
    caller: Caller,
    Json(mut payload): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransactionRecord>), ApiError> {
    payload.initiator = Initiator::Customer;
    let record = state.ledger.transfer(&payload).await?;
    info!(service = caller.service(), transaction_id = %record.id, "transfer requested");
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST `/deposits` - Credit an account from outside the ledger.
async fn deposit(
    State(state): State<AppState>,
    caller: Caller,
    Json(mut payload): Json<MovementRequest>,
) -> Result<(StatusCode, Json<MovementResponse>), ApiError> {
    payload.initiator = Initiator::Customer;
    let record = state.ledger.deposit(&payload).await?;
    info!(service = caller.service(), transaction_id = %record.id, "deposit requested");
    Ok((
        StatusCode::CREATED,
        Json(MovementResponse {
            success: true,
            transaction: record,
        }),
    ))
}

/// POST `/withdrawals` - Debit an account to outside the ledger.
async fn withdraw(
    State(state): State<AppState>,
    caller: Caller,
    Json(mut payload): Json<MovementRequest>,
) -> Result<(StatusCode, Json<MovementResponse>), ApiError> {
    payload.initiator = Initiator::Customer;
    let record = state.ledger.withdraw(&payload).await?;
    info!(service = caller.service(), transaction_id = %record.id, "withdrawal requested");
    Ok((
        StatusCode::CREATED,
        Json(MovementResponse {
            success: true,
            transaction: record,
        }),
    ))
}

/// POST `/batch-transfers` - Apply every leg or none.
///
/// A rejected batch answers 422 with every failing leg.
async fn batch_transfer(
    State(state): State<AppState>,
    caller: Caller,
    Json(mut payload): Json<BatchTransferRequest>,
) -> Result<Response, ApiError> {
    payload.initiator = Initiator::Customer;
    let outcome = state.ledger.batch_transfer(&payload).await?;
    if outcome.is_applied() {
        info!(
            service = caller.service(),
            legs = outcome.succeeded.len(),
            "batch transfer applied"
        );
        return Ok((
            StatusCode::CREATED,
            Json(serde_json::json!({ "transactions": outcome.succeeded })),
        )
            .into_response());
    }

    let failed: Vec<LegFailureResponse> = outcome
        .failed
        .into_iter()
        .map(|f| LegFailureResponse {
            index: f.index,
            account: f.account,
            error: f.error.error_code(),
            message: f.error.user_message(),
        })
        .collect();
    Ok((
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(serde_json::json!({
            "error": "BATCH_REJECTED",
            "message": "No leg was applied because some legs failed.",
            "failed": failed,
        })),
    )
        .into_response())
}

/// GET `/transactions/{transaction_id}` - A transaction with its entries.
async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<Json<TransactionDetail>, ApiError> {
    Ok(Json(state.ledger.get_transaction(transaction_id).await?))
}

/// POST `/transactions/{transaction_id}/reverse` - Offset a completed transaction.
async fn reverse_transaction(
    State(state): State<AppState>,
    caller: Caller,
    Path(transaction_id): Path<TransactionId>,
    Json(payload): Json<ReverseRequest>,
) -> Result<(StatusCode, Json<TransactionRecord>), ApiError> {
    if payload.reason.trim().is_empty() {
        return Err(ApiError::bad_request("MISSING_REASON", "A reversal needs a reason."));
    }
    let record = state
        .ledger
        .reverse_transaction(transaction_id, &payload.reason)
        .await?;
    info!(
        service = caller.service(),
        transaction_id = %transaction_id,
        reversal_id = %record.id,
        "transaction reversed"
    );
    Ok((StatusCode::CREATED, Json(record)))
}
