use axum::{
    extract::{Extension, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{middleware::actor::CurrentActor, state::AppState},
    domain::{LedgerEntryStatus, LedgerEntryType, WalletLedgerEntry},
    error::{AppError, Result},
    service::TopUpIntent,
};

#[derive(Debug, Serialize)]
pub struct WalletDto {
    user_id: Uuid,
    balance: i64,
    updated_at: String,
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
) -> Result<Json<WalletDto>> {
    let account = state
        .service_context
        .wallet_service
        .account(actor.user.id)
        .await?;

    Ok(Json(WalletDto {
        user_id: account.user_id,
        balance: account.balance,
        updated_at: account.updated_at.to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct LedgerParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct LedgerEntryDto {
    id: Uuid,
    transaction_code: String,
    entry_type: LedgerEntryType,
    amount: i64,
    description: String,
    reference_id: Option<String>,
    status: LedgerEntryStatus,
    balance_after: Option<i64>,
    created_at: String,
}

impl From<WalletLedgerEntry> for LedgerEntryDto {
    fn from(entry: WalletLedgerEntry) -> Self {
        Self {
            id: entry.id,
            transaction_code: entry.transaction_code,
            entry_type: entry.entry_type,
            amount: entry.amount,
            description: entry.description,
            reference_id: entry.reference_id,
            status: entry.status,
            balance_after: entry.balance_after,
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    entries: Vec<LedgerEntryDto>,
    total: usize,
}

pub async fn ledger(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Query(params): Query<LedgerParams>,
) -> Result<Json<LedgerResponse>> {
    let entries = state
        .service_context
        .wallet_service
        .history(actor.user.id, params.limit, params.offset)
        .await?;

    let total = entries.len();
    let entries: Vec<LedgerEntryDto> = entries.into_iter().map(Into::into).collect();

    Ok(Json(LedgerResponse { entries, total }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct TopUpDto {
    #[validate(range(min = 1, message = "amount must be positive"))]
    amount: i64,
}

pub async fn top_up(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Json(dto): Json<TopUpDto>,
) -> Result<Json<TopUpIntent>> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let intent = state
        .service_context
        .wallet_service
        .initiate_top_up(&actor.user, dto.amount)
        .await?;

    Ok(Json(intent))
}
