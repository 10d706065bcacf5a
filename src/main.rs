mod api;
mod config;
mod domain;
mod error;
mod notifications;
mod payments;
mod repository;
mod service;

use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Settings,
    notifications::{webhook_sink::WebhookSink, NotificationManager},
    payments::{PaymentGateway, StripeGateway},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookvault=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!(
        "Starting Bookvault server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    // Initialize payment gateway if configured
    let gateway: Option<Arc<dyn PaymentGateway>> = if settings.payments.enabled {
        if let Some(secret_key) = settings.payments.secret_key.clone() {
            tracing::info!("Stripe payment processing enabled");
            Some(Arc::new(StripeGateway::new(
                secret_key,
                &settings.payments.currency,
                settings.server.base_url.clone(),
            )?))
        } else {
            tracing::warn!("Payments enabled but missing secret key");
            None
        }
    } else {
        tracing::info!("Payment processing disabled");
        None
    };

    // Initialize notification manager and sinks
    let notification_manager = Arc::new(NotificationManager::new());
    if let Some(webhook) = WebhookSink::new(settings.notifications.webhook.clone()) {
        notification_manager.register(Arc::new(webhook)).await;
    }

    // Check sink health
    let health_results = notification_manager.health_check_all().await;
    for (name, result) in health_results {
        match result {
            Ok(_) => tracing::info!("Notification sink {} is healthy", name),
            Err(e) => tracing::warn!("Notification sink {} health check failed: {:?}", name, e),
        }
    }

    // Create service context
    let service_context = Arc::new(ServiceContext::new(
        &settings,
        db_pool.clone(),
        gateway,
        notification_manager,
    ));

    // Create the app
    let app = api::create_app(service_context, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        settings.server.host, settings.server.port
    ))
    .await?;

    tracing::info!(
        "Server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
