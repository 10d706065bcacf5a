use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use crate::{
    api::state::AppState,
    error::{AppError, Result},
    payments::StripeGateway,
    service::PaymentNotification,
};

/// Normalized notification endpoint for gateway adapters that run as
/// separate processes. Always acknowledges structurally valid payloads;
/// the reconciler absorbs duplicates, test pings and orphans.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(notification): Json<PaymentNotification>,
) -> Result<Json<Value>> {
    let outcome = state
        .service_context
        .reconcile_service
        .reconcile(notification)
        .await?;

    Ok(Json(json!({ "received": true, "outcome": outcome })))
}

/// Raw Stripe webhook. Signature verification happens before anything is
/// read from the payload; past that point the handler never reports
/// failure back to Stripe, because a retry cannot fix a data gap on our
/// side.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>> {
    let secret = state
        .settings
        .payments
        .webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::Payment("Stripe webhooks are not configured".to_string()))?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    let notification = StripeGateway::parse_webhook(&body, signature, secret)?;

    let outcome = match notification {
        Some(notification) => Some(
            state
                .service_context
                .reconcile_service
                .reconcile(notification)
                .await?,
        ),
        None => None,
    };

    Ok(Json(json!({ "received": true, "outcome": outcome })))
}
