mod common;

use bookvault::{
    domain::{LedgerEntryStatus, LedgerEntryType},
    error::AppError,
    service::wallet_service::WalletService,
};

#[tokio::test]
async fn debit_rejects_overdraft_and_writes_nothing() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let user = common::create_client(&pool, 100).await?;

    let mut tx = pool.begin().await?;
    let result = WalletService::debit(
        &mut tx,
        user.id,
        150,
        LedgerEntryType::BookingPayment,
        "Over the balance".to_string(),
        None,
    )
    .await;
    tx.rollback().await?;

    assert!(matches!(result, Err(AppError::InsufficientFunds(_))));
    assert_eq!(common::balance_of(&pool, &user).await?, 100);

    // Only the funding entry exists
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallet_ledger WHERE user_id = ?")
        .bind(user.id.to_string())
        .fetch_one(&pool)
        .await?;
    assert_eq!(count, 1);

    Ok(())
}

#[tokio::test]
async fn credit_and_debit_track_balance_after() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let user = common::create_client(&pool, 0).await?;

    let mut tx = pool.begin().await?;
    let credit = WalletService::credit(
        &mut tx,
        user.id,
        1_000,
        LedgerEntryType::TopUp,
        "Funding".to_string(),
        None,
    )
    .await?;
    let debit = WalletService::debit(
        &mut tx,
        user.id,
        400,
        LedgerEntryType::BookingPayment,
        "Spend".to_string(),
        None,
    )
    .await?;
    tx.commit().await?;

    assert_eq!(credit.amount, 1_000);
    assert_eq!(credit.balance_after, Some(1_000));
    assert_eq!(credit.status, LedgerEntryStatus::Completed);
    assert_eq!(debit.amount, -400);
    assert_eq!(debit.balance_after, Some(600));
    assert_eq!(common::balance_of(&pool, &user).await?, 600);

    Ok(())
}

#[tokio::test]
async fn singleton_references_do_not_double_apply() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let user = common::create_client(&pool, 10_000).await?;

    let mut tx = pool.begin().await?;
    let first = WalletService::debit(
        &mut tx,
        user.id,
        2_500,
        LedgerEntryType::EscrowHold,
        "Hold".to_string(),
        Some("escrow-1".to_string()),
    )
    .await?;
    tx.commit().await?;

    // Retried delivery of the same logical mutation
    let mut tx = pool.begin().await?;
    let second = WalletService::debit(
        &mut tx,
        user.id,
        2_500,
        LedgerEntryType::EscrowHold,
        "Hold".to_string(),
        Some("escrow-1".to_string()),
    )
    .await?;
    tx.commit().await?;

    assert_eq!(first.id, second.id);
    assert_eq!(first.transaction_code, second.transaction_code);
    assert_eq!(common::balance_of(&pool, &user).await?, 7_500);

    Ok(())
}

#[tokio::test]
async fn concurrent_debits_never_overdraw() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let user = common::create_client(&pool, 150).await?;

    let attempt = |pool: sqlx::SqlitePool| {
        let user_id = user.id;
        async move {
            let mut tx = pool.begin().await?;
            let result = WalletService::debit(
                &mut tx,
                user_id,
                100,
                LedgerEntryType::BookingPayment,
                "Race".to_string(),
                None,
            )
            .await;
            match result {
                Ok(_) => {
                    tx.commit().await?;
                    anyhow::Ok(true)
                }
                Err(AppError::InsufficientFunds(_)) => {
                    tx.rollback().await?;
                    anyhow::Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        }
    };

    let (a, b) = tokio::join!(attempt(pool.clone()), attempt(pool.clone()));
    let successes = [a?, b?].iter().filter(|s| **s).count();

    assert_eq!(successes, 1);
    assert_eq!(common::balance_of(&pool, &user).await?, 50);

    Ok(())
}

#[tokio::test]
async fn pending_top_up_settles_once() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let user = common::create_client(&pool, 0).await?;

    let mut tx = pool.begin().await?;
    let pending = WalletService::record_pending_top_up(
        &mut tx,
        user.id,
        30_000,
        "cs_test_abc123".to_string(),
        "Wallet top-up via stripe".to_string(),
    )
    .await?;
    tx.commit().await?;

    assert_eq!(pending.status, LedgerEntryStatus::Pending);
    assert_eq!(pending.balance_after, None);
    assert_eq!(common::balance_of(&pool, &user).await?, 0);

    let mut tx = pool.begin().await?;
    let settled = WalletService::complete_pending_top_up(&mut tx, "cs_test_abc123")
        .await?
        .expect("entry should exist");
    tx.commit().await?;

    assert_eq!(settled.entry_type, LedgerEntryType::TopUp);
    assert_eq!(settled.status, LedgerEntryStatus::Completed);
    assert_eq!(settled.balance_after, Some(30_000));
    assert_eq!(common::balance_of(&pool, &user).await?, 30_000);

    // Replay is a no-op success
    let mut tx = pool.begin().await?;
    let replay = WalletService::complete_pending_top_up(&mut tx, "cs_test_abc123")
        .await?
        .expect("entry should exist");
    tx.commit().await?;

    assert_eq!(replay.id, settled.id);
    assert_eq!(common::balance_of(&pool, &user).await?, 30_000);

    // Unknown orders are reported, not invented
    let mut tx = pool.begin().await?;
    let missing = WalletService::complete_pending_top_up(&mut tx, "cs_test_unknown").await?;
    tx.commit().await?;
    assert!(missing.is_none());

    Ok(())
}
