use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    api::{middleware::actor::CurrentActor, state::AppState},
    domain::{EscrowStatus, EscrowTransaction},
    error::{AppError, Result},
};

#[derive(Debug, Serialize)]
pub struct EscrowDto {
    id: Uuid,
    booking_id: Uuid,
    payer_id: Uuid,
    payee_id: Uuid,
    amount: i64,
    refunded_amount: Option<i64>,
    status: EscrowStatus,
    transaction_code: String,
    created_at: String,
    released_at: Option<String>,
    refunded_at: Option<String>,
}

impl From<EscrowTransaction> for EscrowDto {
    fn from(escrow: EscrowTransaction) -> Self {
        Self {
            id: escrow.id,
            booking_id: escrow.booking_id,
            payer_id: escrow.payer_id,
            payee_id: escrow.payee_id,
            amount: escrow.amount,
            refunded_amount: escrow.refunded_amount,
            status: escrow.status,
            transaction_code: escrow.transaction_code,
            created_at: escrow.created_at.to_rfc3339(),
            released_at: escrow.released_at.map(|dt| dt.to_rfc3339()),
            refunded_at: escrow.refunded_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

pub async fn get_for_booking(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<EscrowDto>> {
    let escrow = state
        .service_context
        .escrow_service
        .get_for_booking(booking_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No escrow for this booking".to_string()))?;

    if escrow.payer_id != actor.user.id && escrow.payee_id != actor.user.id {
        return Err(AppError::Forbidden);
    }

    Ok(Json(escrow.into()))
}

/// Operator path: force-release a booking's held funds to the payee.
/// Responds with whether this call did the release; `false` means it was
/// already resolved, which retried operator actions are expected to hit.
pub async fn release(
    State(state): State<AppState>,
    Extension(_actor): Extension<CurrentActor>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>> {
    let released = state
        .service_context
        .escrow_service
        .release_for_booking(booking_id)
        .await?;

    Ok(Json(json!({ "released": released })))
}

#[derive(Debug, Deserialize)]
pub struct RefundDto {
    amount: Option<i64>,
    reason: Option<String>,
}

/// Operator path: refund a held escrow (fully by default) back to the
/// payer. Duplicate calls come back `refunded: false` instead of
/// double-crediting.
pub async fn refund(
    State(state): State<AppState>,
    Extension(_actor): Extension<CurrentActor>,
    Path(escrow_id): Path<Uuid>,
    Json(dto): Json<RefundDto>,
) -> Result<Json<Value>> {
    let reason = dto
        .reason
        .unwrap_or_else(|| "Refunded by operator".to_string());

    let refunded = state
        .service_context
        .escrow_service
        .refund(escrow_id, dto.amount, &reason)
        .await?;

    Ok(Json(json!({ "refunded": refunded })))
}
