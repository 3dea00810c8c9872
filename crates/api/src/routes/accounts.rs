//! Account store routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use kinko_core::account::{Account, AccountRef, OpenAccountRequest};
use kinko_core::ledger::{LedgerError, TransactionSummary};
use kinko_shared::types::AccountId;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppState, error::ApiError, middleware::Caller};

/// Creates the account routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/accounts", post(open_account))
        .route("/accounts/{account_id}", get(get_account_by_id))
        .route("/accounts/{account_id}/close", post(close_account))
        .route("/accounts/{account_id}/transactions", get(get_transaction_history))
        .route("/customers/{owner}/account", get(get_primary_account))
        .route("/customers/{owner}/accounts", get(get_accounts))
        .route("/customers/{owner}/authenticate", post(authenticate))
        .route("/customers/{owner}/credentials", post(reset_credentials))
}

/// Request body for authenticating a customer.
#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    /// The customer's PIN.
    pub secret: String,
}

/// Authentication outcome.
#[derive(Debug, Serialize)]
pub struct AuthenticateResponse {
    /// Whether the secret matched and authentication is not locked.
    pub authenticated: bool,
}

/// Request body for resetting a customer's PIN.
#[derive(Debug, Deserialize)]
pub struct ResetCredentialsRequest {
    /// New PIN, 4 to 8 digits.
    pub pin: String,
}

/// Query parameters for transaction history.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of transactions.
    pub limit: Option<u64>,
}

/// Account list response.
#[derive(Debug, Serialize)]
pub struct AccountsResponse {
    /// The customer's accounts.
    pub accounts: Vec<Account>,
}

/// Transaction history response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Newest first.
    pub transactions: Vec<TransactionSummary>,
}

/// POST `/accounts` - Open an account, registering the customer on first open.
async fn open_account(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<OpenAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state.accounts.open_account(&payload).await?;
    info!(
        service = caller.service(),
        account_id = %account.id,
        branch_code = %account.branch_code,
        "account opened"
    );
    Ok((StatusCode::CREATED, Json(account)))
}

/// GET `/accounts/{account_id}` - One account.
async fn get_account_by_id(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Account>, ApiError> {
    state
        .accounts
        .get_by_id(account_id)
        .await?
        .map(Json)
        .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()).into())
}

/// POST `/accounts/{account_id}/close` - Close an empty account.
async fn close_account(
    State(state): State<AppState>,
    caller: Caller,
    Path(account_id): Path<AccountId>,
) -> Result<Json<Account>, ApiError> {
    let account = state.accounts.close_account(account_id).await?;
    info!(service = caller.service(), account_id = %account_id, "account closed");
    Ok(Json(account))
}

/// GET `/accounts/{account_id}/transactions?limit=` - Recent transactions.
async fn get_transaction_history(
    State(state): State<AppState>,
    Path(account_id): Path<AccountId>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let transactions = state
        .ledger
        .get_transaction_history(&AccountRef::id(account_id), query.limit)
        .await?;
    Ok(Json(HistoryResponse { transactions }))
}

/// GET `/customers/{owner}/account` - The customer's first account.
async fn get_primary_account(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<Account>, ApiError> {
    state
        .accounts
        .get_account(&owner)
        .await?
        .map(Json)
        .ok_or_else(|| LedgerError::AccountNotFound(owner).into())
}

/// GET `/customers/{owner}/accounts` - Every account of the customer.
async fn get_accounts(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<AccountsResponse>, ApiError> {
    let accounts = state.accounts.get_accounts(&owner).await?;
    Ok(Json(AccountsResponse { accounts }))
}

/// POST `/customers/{owner}/authenticate` - Check a PIN.
async fn authenticate(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(payload): Json<AuthenticateRequest>,
) -> Result<Json<AuthenticateResponse>, ApiError> {
    let authenticated = state.accounts.authenticate(&owner, &payload.secret).await?;
    Ok(Json(AuthenticateResponse { authenticated }))
}

/// POST `/customers/{owner}/credentials` - Replace the PIN and unlock.
async fn reset_credentials(
    State(state): State<AppState>,
    caller: Caller,
    Path(owner): Path<String>,
    Json(payload): Json<ResetCredentialsRequest>,
) -> Result<StatusCode, ApiError> {
    state.accounts.reset_credentials(&owner, &payload.pin).await?;
    info!(service = caller.service(), owner_identity = %owner, "credentials reset");
    Ok(StatusCode::NO_CONTENT)
}
