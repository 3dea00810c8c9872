//! Chip economy routes for game and shop modules.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use kinko_core::account::AccountRef;
use kinko_core::chips::{ChipBalance, LockRequest};
use kinko_db::entities::{chip_locks, customers};
use kinko_db::repositories::ChipReceipt;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppState, error::ApiError, middleware::Caller};

/// Creates the chip routes (requires auth middleware to be applied externally).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/customers/{owner}/chips", get(get_chip_balance))
        .route("/chips/purchase", post(purchase))
        .route("/chips/bonus", post(grant_bonus))
        .route("/chips/lock", post(lock))
        .route("/chips/distribute", post(distribute))
        .route("/chips/release", post(release))
        .route("/chips/transfer", post(transfer))
        .route("/chips/redemption-account", post(register_redemption_account))
        .route("/chips/redeem", post(redeem))
}

/// Request body for buying chips.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    /// Buyer.
    pub owner_identity: String,
    /// Account the cash is taken from.
    pub account: AccountRef,
    /// Number of chips.
    pub chips: i64,
}

/// Request body for granting bonus chips.
#[derive(Debug, Deserialize)]
pub struct BonusRequest {
    /// Recipient.
    pub owner_identity: String,
    /// Number of chips.
    pub chips: i64,
    /// Promotion or reason.
    pub reason: String,
}

/// Request body for starting a round.
#[derive(Debug, Deserialize)]
pub struct LockChipsRequest {
    /// Round identifier chosen by the game module.
    pub game_session_id: String,
    /// Every participant's stake.
    pub participants: Vec<LockRequest>,
}

/// Request body for settling a round.
#[derive(Debug, Deserialize)]
pub struct DistributeRequest {
    /// Round identifier.
    pub game_session_id: String,
    /// Chips paid back to each participant.
    pub payouts: HashMap<String, i64>,
    /// Business date winnings are recorded on.
    #[serde(default)]
    pub business_date: Option<NaiveDate>,
}

/// Request body for cancelling a round.
#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    /// Round identifier.
    pub game_session_id: String,
}

/// Request body for a chip transfer.
#[derive(Debug, Deserialize)]
pub struct ChipTransferRequest {
    /// Sender.
    pub from_owner: String,
    /// Recipient.
    pub to_owner: String,
    /// Number of base chips.
    pub chips: i64,
}

/// Request body for registering the redemption account.
#[derive(Debug, Deserialize)]
pub struct RedemptionAccountRequest {
    /// Customer.
    pub owner_identity: String,
    /// One of the customer's accounts.
    pub account: AccountRef,
}

/// Request body for redeeming chips.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// Customer.
    pub owner_identity: String,
    /// Number of base chips.
    pub chips: i64,
}

/// Locks of a round after a lock, settlement or release.
#[derive(Debug, Serialize)]
pub struct LocksResponse {
    /// Round identifier.
    pub game_session_id: String,
    /// Locks changed by this call.
    pub locks: Vec<chip_locks::Model>,
}

/// GET `/customers/{owner}/chips` - Chip balance.
async fn get_chip_balance(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<ChipBalance>, ApiError> {
    Ok(Json(state.chips.get_chip_balance(&owner).await?))
}

/// POST `/chips/purchase` - Buy base chips with cash.
async fn purchase(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<PurchaseRequest>,
) -> Result<(StatusCode, Json<ChipReceipt>), ApiError> {
    let receipt = state
        .chips
        .purchase_chips(&payload.owner_identity, &payload.account, payload.chips)
        .await?;
    info!(service = caller.service(), chips = payload.chips, "chips purchased");
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST `/chips/bonus` - Grant use-only bonus chips.
async fn grant_bonus(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<BonusRequest>,
) -> Result<Json<ChipBalance>, ApiError> {
    let balance = state
        .chips
        .grant_bonus_chips(&payload.owner_identity, payload.chips, &payload.reason)
        .await?;
    info!(service = caller.service(), chips = payload.chips, "bonus chips granted");
    Ok(Json(balance))
}

/// POST `/chips/lock` - Commit every participant's stake, or nobody's.
async fn lock(
    State(state): State<AppState>,
    Json(payload): Json<LockChipsRequest>,
) -> Result<(StatusCode, Json<LocksResponse>), ApiError> {
    let locks = state
        .chips
        .lock_chips(&payload.game_session_id, &payload.participants)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(LocksResponse {
            game_session_id: payload.game_session_id,
            locks,
        }),
    ))
}

/// POST `/chips/distribute` - Settle a round. Replays settle nothing.
async fn distribute(
    State(state): State<AppState>,
    Json(payload): Json<DistributeRequest>,
) -> Result<Json<LocksResponse>, ApiError> {
    let today = state.business_date(payload.business_date)?;
    let locks = state
        .chips
        .distribute_chips(&payload.game_session_id, &payload.payouts, today)
        .await?;
    Ok(Json(LocksResponse {
        game_session_id: payload.game_session_id,
        locks,
    }))
}

/// POST `/chips/release` - Cancel a round and return the stakes.
async fn release(
    State(state): State<AppState>,
    Json(payload): Json<ReleaseRequest>,
) -> Result<Json<LocksResponse>, ApiError> {
    let locks = state.chips.release_chips(&payload.game_session_id).await?;
    Ok(Json(LocksResponse {
        game_session_id: payload.game_session_id,
        locks,
    }))
}

/// POST `/chips/transfer` - Send base chips to another customer.
async fn transfer(
    State(state): State<AppState>,
    Json(payload): Json<ChipTransferRequest>,
) -> Result<Json<ChipBalance>, ApiError> {
    let balance = state
        .chips
        .transfer_chips(&payload.from_owner, &payload.to_owner, payload.chips)
        .await?;
    Ok(Json(balance))
}

/// POST `/chips/redemption-account` - Choose where redemptions are paid.
async fn register_redemption_account(
    State(state): State<AppState>,
    Json(payload): Json<RedemptionAccountRequest>,
) -> Result<Json<customers::Model>, ApiError> {
    let customer = state
        .chips
        .register_redemption_account(&payload.owner_identity, &payload.account)
        .await?;
    Ok(Json(customer))
}

/// POST `/chips/redeem` - Exchange base chips for cash.
async fn redeem(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<RedeemRequest>,
) -> Result<(StatusCode, Json<ChipReceipt>), ApiError> {
    let receipt = state
        .chips
        .redeem_chips(&payload.owner_identity, payload.chips)
        .await?;
    info!(service = caller.service(), chips = payload.chips, "chips redeemed");
    Ok((StatusCode::CREATED, Json(receipt)))
}
