mod common;

use bookvault::{
    domain::{
        BookingPaymentStatus, BookingStatus, CreateBookingRequest, EscrowStatus,
    },
    error::AppError,
};
use chrono::{Duration, NaiveTime, Utc};

fn slot(payee_id: uuid::Uuid, days_ahead: i64, start: &str, end: &str) -> CreateBookingRequest {
    CreateBookingRequest {
        payee_id,
        date: (Utc::now() + Duration::days(days_ahead)).date_naive(),
        start_time: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
        end_time: NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
        location: None,
        notes: None,
    }
}

#[tokio::test]
async fn booking_creation_holds_funds_in_escrow() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let client = common::create_client(&pool, 100_000).await?;
    let provider = common::create_provider(&pool, 10_000).await?;

    let booking = ctx
        .booking_service
        .create(client.id, slot(provider.id, 10, "10:00", "12:00"))
        .await?;

    assert_eq!(booking.total_price, 20_000);
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Held);
    assert_eq!(common::balance_of(&pool, &client).await?, 80_000);

    let escrow = ctx
        .escrow_service
        .get_for_booking(booking.id)
        .await?
        .expect("escrow should exist");
    assert_eq!(escrow.status, EscrowStatus::Held);
    assert_eq!(escrow.amount, 20_000);
    assert_eq!(escrow.payer_id, client.id);
    assert_eq!(escrow.payee_id, provider.id);

    Ok(())
}

#[tokio::test]
async fn failed_hold_rolls_back_the_whole_booking() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let client = common::create_client(&pool, 1_000).await?;
    let provider = common::create_provider(&pool, 10_000).await?;

    let result = ctx
        .booking_service
        .create(client.id, slot(provider.id, 10, "10:00", "12:00"))
        .await;

    assert!(matches!(result, Err(AppError::InsufficientFunds(_))));
    assert_eq!(common::balance_of(&pool, &client).await?, 1_000);

    // Neither the booking nor the escrow row survived the rollback
    let bookings = ctx.booking_service.list_for_user(client.id, 10, 0).await?;
    assert!(bookings.is_empty());
    let escrows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM escrow_transactions")
        .fetch_one(&pool)
        .await?;
    assert_eq!(escrows, 0);

    Ok(())
}

#[tokio::test]
async fn release_pays_the_payee_exactly_once() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let client = common::create_client(&pool, 100_000).await?;
    let provider = common::create_provider(&pool, 10_000).await?;

    let booking = ctx
        .booking_service
        .create(client.id, slot(provider.id, 10, "10:00", "12:00"))
        .await?;

    let released = ctx.escrow_service.release_for_booking(booking.id).await?;
    assert!(released);
    assert_eq!(common::balance_of(&pool, &provider).await?, 20_000);

    let booking = ctx.booking_service.get(booking.id).await?;
    assert_eq!(booking.status, BookingStatus::Completed);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Settled);

    // A duplicate release finds no Held escrow and credits nothing
    let again = ctx.escrow_service.release_for_booking(booking.id).await?;
    assert!(!again);
    assert_eq!(common::balance_of(&pool, &provider).await?, 20_000);

    let escrow = ctx
        .escrow_service
        .get_for_booking(booking.id)
        .await?
        .expect("escrow should exist");
    assert_eq!(escrow.status, EscrowStatus::Released);
    assert!(escrow.released_at.is_some());

    Ok(())
}

#[tokio::test]
async fn refund_returns_funds_once_and_caps_at_the_hold() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let client = common::create_client(&pool, 100_000).await?;
    let provider = common::create_provider(&pool, 10_000).await?;

    let booking = ctx
        .booking_service
        .create(client.id, slot(provider.id, 10, "10:00", "12:00"))
        .await?;
    let escrow = ctx
        .escrow_service
        .get_for_booking(booking.id)
        .await?
        .expect("escrow should exist");

    // Ask for more than was ever held; the credit caps at the hold
    let refunded = ctx
        .escrow_service
        .refund(escrow.id, Some(999_999), "operator refund")
        .await?;
    assert!(refunded);
    assert_eq!(common::balance_of(&pool, &client).await?, 100_000);
    assert_eq!(common::balance_of(&pool, &provider).await?, 0);

    let booking = ctx.booking_service.get(booking.id).await?;
    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Refunded);
    assert_eq!(booking.cancellation_reason.as_deref(), Some("operator refund"));

    // Retried refund is benign and does not double-credit
    let again = ctx
        .escrow_service
        .refund(escrow.id, None, "operator refund")
        .await?;
    assert!(!again);
    assert_eq!(common::balance_of(&pool, &client).await?, 100_000);

    // Release after refund is also a no-op: exactly one resolution wins
    let released = ctx.escrow_service.release_for_booking(booking.id).await?;
    assert!(!released);
    assert_eq!(common::balance_of(&pool, &provider).await?, 0);

    Ok(())
}

#[tokio::test]
async fn partial_refund_withholds_the_remainder() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let client = common::create_client(&pool, 100_000).await?;
    let provider = common::create_provider(&pool, 10_000).await?;

    let booking = ctx
        .booking_service
        .create(client.id, slot(provider.id, 10, "10:00", "12:00"))
        .await?;
    let escrow = ctx
        .escrow_service
        .get_for_booking(booking.id)
        .await?
        .expect("escrow should exist");

    let refunded = ctx
        .escrow_service
        .refund(escrow.id, Some(5_000), "late cancellation")
        .await?;
    assert!(refunded);

    // 5,000 of the 20,000 hold went back; the rest goes to no one
    assert_eq!(common::balance_of(&pool, &client).await?, 85_000);
    assert_eq!(common::balance_of(&pool, &provider).await?, 0);

    let escrow = ctx
        .escrow_service
        .get_for_booking(booking.id)
        .await?
        .expect("escrow should exist");
    assert_eq!(escrow.status, EscrowStatus::Refunded);
    assert_eq!(escrow.refunded_amount, Some(5_000));

    Ok(())
}
