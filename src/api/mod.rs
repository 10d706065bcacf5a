pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{config::Settings, service::ServiceContext};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        // API routes
        .nest("/api", api_routes(app_state.clone()))
        // Add state to the router
        .with_state(app_state)
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/bookings", booking_routes(state.clone()))
        .nest("/wallet", wallet_routes(state.clone()))
        .nest("/escrows", escrow_routes(state.clone()))
        .nest("/payments", payment_routes())
}

fn booking_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::bookings::list))
        .route("/", post(handlers::bookings::create))
        .route("/quote", post(handlers::bookings::quote))
        .route("/:id", get(handlers::bookings::get))
        .route("/:id", put(handlers::bookings::update))
        .route("/:id/confirm", post(handlers::bookings::confirm))
        .route("/:id/complete", post(handlers::bookings::complete))
        .route("/:id/cancel", post(handlers::bookings::cancel))
        .route("/:id/escrow", get(handlers::escrows::get_for_booking))
        .route("/:id/escrow/release", post(handlers::escrows::release))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::actor::require_actor,
        ))
}

fn wallet_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::wallet::get_wallet))
        .route("/ledger", get(handlers::wallet::ledger))
        .route("/topup", post(handlers::wallet::top_up))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::actor::require_actor,
        ))
}

fn escrow_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:id/refund", post(handlers::escrows::refund))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::actor::require_actor,
        ))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        // Webhook endpoints carry gateway signatures instead of actor auth
        .route("/webhook", post(handlers::webhooks::payment_webhook))
        .route("/webhook/stripe", post(handlers::webhooks::stripe_webhook))
}
