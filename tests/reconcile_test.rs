mod common;

use bookvault::{
    domain::{LedgerEntryStatus, LedgerEntryType},
    service::{PaymentNotification, ReconcileOutcome},
};

fn success(order: &str, amount: i64) -> PaymentNotification {
    PaymentNotification {
        external_order_id: order.to_string(),
        amount,
        succeeded: true,
        code: None,
        description: None,
        reference: None,
    }
}

fn failure(order: &str, amount: i64, why: &str) -> PaymentNotification {
    PaymentNotification {
        external_order_id: order.to_string(),
        amount,
        succeeded: false,
        code: None,
        description: Some(why.to_string()),
        reference: None,
    }
}

#[tokio::test]
async fn successful_notification_credits_exactly_once() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let user = common::create_client(&pool, 0).await?;

    let intent = ctx.wallet_service.initiate_top_up(&user, 30_000).await?;
    assert_eq!(common::balance_of(&pool, &user).await?, 0);

    let outcome = ctx
        .reconcile_service
        .reconcile(success(&intent.external_order_id, 30_000))
        .await?;
    assert_eq!(outcome, ReconcileOutcome::Credited);
    assert_eq!(common::balance_of(&pool, &user).await?, 30_000);

    // The gateway retries; the balance must not move again
    let replay = ctx
        .reconcile_service
        .reconcile(success(&intent.external_order_id, 30_000))
        .await?;
    assert_eq!(replay, ReconcileOutcome::AlreadyProcessed);
    assert_eq!(common::balance_of(&pool, &user).await?, 30_000);

    // Exactly one Completed TopUp entry for the order
    let completed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM wallet_ledger WHERE reference_id = ? AND status = 'Completed'",
    )
    .bind(&intent.external_order_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(completed, 1);

    Ok(())
}

#[tokio::test]
async fn failed_notification_marks_the_entry_without_crediting() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let user = common::create_client(&pool, 0).await?;

    let intent = ctx.wallet_service.initiate_top_up(&user, 30_000).await?;

    let outcome = ctx
        .reconcile_service
        .reconcile(failure(&intent.external_order_id, 30_000, "card declined"))
        .await?;
    assert_eq!(outcome, ReconcileOutcome::MarkedFailed);
    assert_eq!(common::balance_of(&pool, &user).await?, 0);

    let entries = ctx.wallet_service.history(user.id, 10, 0).await?;
    let entry = entries
        .iter()
        .find(|e| e.reference_id.as_deref() == Some(intent.external_order_id.as_str()))
        .expect("entry should exist");
    assert_eq!(entry.status, LedgerEntryStatus::Failed);
    assert_eq!(entry.entry_type, LedgerEntryType::TopUpPending);
    assert!(entry.description.contains("card declined"));

    Ok(())
}

#[tokio::test]
async fn orphaned_notifications_are_acknowledged_not_credited() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let user = common::create_client(&pool, 0).await?;

    let outcome = ctx
        .reconcile_service
        .reconcile(success("cs_live_no_such_order", 75_000))
        .await?;

    assert_eq!(outcome, ReconcileOutcome::Orphaned);
    assert_eq!(common::balance_of(&pool, &user).await?, 0);

    let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallet_ledger")
        .fetch_one(&pool)
        .await?;
    assert_eq!(entries, 0);

    Ok(())
}

#[tokio::test]
async fn synthetic_notifications_never_touch_state() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);

    // Sentinel order code
    let sentinel = ctx.reconcile_service.reconcile(success("123", 50_000)).await?;
    assert_eq!(sentinel, ReconcileOutcome::SyntheticIgnored);

    // Sub-threshold amount
    let tiny = ctx
        .reconcile_service
        .reconcile(success("cs_live_small", 100))
        .await?;
    assert_eq!(tiny, ReconcileOutcome::SyntheticIgnored);

    // Gateway-reserved numeric order range
    let reserved = ctx.reconcile_service.reconcile(success("42", 50_000)).await?;
    assert_eq!(reserved, ReconcileOutcome::SyntheticIgnored);

    let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallet_ledger")
        .fetch_one(&pool)
        .await?;
    assert_eq!(entries, 0);

    Ok(())
}

#[tokio::test]
async fn lookup_falls_back_to_the_reference_field() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let user = common::create_client(&pool, 0).await?;

    let intent = ctx.wallet_service.initiate_top_up(&user, 30_000).await?;

    // Some gateways put the order id in `reference` and their own id first
    let notification = PaymentNotification {
        external_order_id: "gw_evt_991x".to_string(),
        amount: 30_000,
        succeeded: true,
        code: None,
        description: None,
        reference: Some(intent.external_order_id.clone()),
    };

    let outcome = ctx.reconcile_service.reconcile(notification).await?;
    assert_eq!(outcome, ReconcileOutcome::Credited);
    assert_eq!(common::balance_of(&pool, &user).await?, 30_000);

    Ok(())
}
