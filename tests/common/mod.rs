#![allow(dead_code)]

use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use bookvault::{
    config::Settings,
    domain::{CreateUserRequest, LedgerEntryType, User, UserRole},
    notifications::NotificationManager,
    payments::{FakePaymentGateway, PaymentGateway},
    repository::{SqliteUserRepository, UserRepository},
    service::{wallet_service::WalletService, ServiceContext},
};

/// One shared in-memory database per test. A single pooled connection keeps
/// every task looking at the same data.
pub async fn setup_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

pub fn context(pool: &SqlitePool) -> Arc<ServiceContext> {
    let settings = Settings::default();
    let gateway: Arc<dyn PaymentGateway> = Arc::new(FakePaymentGateway::new());
    Arc::new(ServiceContext::new(
        &settings,
        pool.clone(),
        Some(gateway),
        Arc::new(NotificationManager::new()),
    ))
}

pub async fn create_client(pool: &SqlitePool, balance: i64) -> anyhow::Result<User> {
    let repo = SqliteUserRepository::new(pool.clone());
    let user = repo
        .create(CreateUserRequest {
            full_name: "Test Client".to_string(),
            role: UserRole::Client,
            verified: true,
            accepting_bookings: false,
            hourly_rate: None,
        })
        .await?;

    if balance > 0 {
        let mut tx = pool.begin().await?;
        WalletService::credit(
            &mut tx,
            user.id,
            balance,
            LedgerEntryType::TopUp,
            "Test funding".to_string(),
            None,
        )
        .await?;
        tx.commit().await?;
    }

    Ok(user)
}

pub async fn create_provider(pool: &SqlitePool, hourly_rate: i64) -> anyhow::Result<User> {
    let repo = SqliteUserRepository::new(pool.clone());
    let user = repo
        .create(CreateUserRequest {
            full_name: "Test Provider".to_string(),
            role: UserRole::Provider,
            verified: true,
            accepting_bookings: true,
            hourly_rate: Some(hourly_rate),
        })
        .await?;

    Ok(user)
}

pub async fn balance_of(pool: &SqlitePool, user: &User) -> anyhow::Result<i64> {
    let balance: Option<i64> =
        sqlx::query_scalar("SELECT balance FROM wallet_accounts WHERE user_id = ?")
            .bind(user.id.to_string())
            .fetch_optional(pool)
            .await?;
    Ok(balance.unwrap_or(0))
}
