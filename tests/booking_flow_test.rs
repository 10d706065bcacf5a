mod common;

use bookvault::{
    domain::{BookingStatus, CreateBookingRequest, UpdateBookingRequest},
    error::AppError,
};
use chrono::{Duration, NaiveTime, Utc};

fn t(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

fn slot(payee_id: uuid::Uuid, days_ahead: i64, start: &str, end: &str) -> CreateBookingRequest {
    CreateBookingRequest {
        payee_id,
        date: (Utc::now() + Duration::days(days_ahead)).date_naive(),
        start_time: t(start),
        end_time: t(end),
        location: None,
        notes: None,
    }
}

#[tokio::test]
async fn overlapping_slots_are_rejected_adjacent_ones_accepted() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let client = common::create_client(&pool, 500_000).await?;
    let provider = common::create_provider(&pool, 10_000).await?;

    ctx.booking_service
        .create(client.id, slot(provider.id, 10, "10:00", "12:00"))
        .await?;

    // [11:00,13:00) collides with [10:00,12:00)
    let overlap = ctx
        .booking_service
        .create(client.id, slot(provider.id, 10, "11:00", "13:00"))
        .await;
    assert!(matches!(overlap, Err(AppError::Validation(_))));

    // Boundary-touching slots do not conflict
    ctx.booking_service
        .create(client.id, slot(provider.id, 10, "12:00", "14:00"))
        .await?;
    ctx.booking_service
        .create(client.id, slot(provider.id, 10, "09:00", "10:00"))
        .await?;

    Ok(())
}

#[tokio::test]
async fn requester_daily_cap_applies() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let client = common::create_client(&pool, 500_000).await?;
    let provider = common::create_provider(&pool, 10_000).await?;

    ctx.booking_service
        .create(client.id, slot(provider.id, 10, "06:00", "07:00"))
        .await?;
    ctx.booking_service
        .create(client.id, slot(provider.id, 10, "08:00", "09:00"))
        .await?;
    ctx.booking_service
        .create(client.id, slot(provider.id, 10, "10:00", "11:00"))
        .await?;

    // Fourth active booking on the same day breaks the cap
    let fourth = ctx
        .booking_service
        .create(client.id, slot(provider.id, 10, "12:00", "13:00"))
        .await;
    assert!(matches!(fourth, Err(AppError::Validation(_))));

    Ok(())
}

#[tokio::test]
async fn cancelling_far_ahead_refunds_everything() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let client = common::create_client(&pool, 100_000).await?;
    let provider = common::create_provider(&pool, 10_000).await?;

    let booking = ctx
        .booking_service
        .create(client.id, slot(provider.id, 10, "10:00", "12:00"))
        .await?;
    assert_eq!(common::balance_of(&pool, &client).await?, 80_000);

    // 10 days out is far beyond the 48-hour band: 100% back
    let cancelled = ctx
        .booking_service
        .cancel(client.id, booking.id, "change of plans".to_string())
        .await?;

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(
        cancelled.cancellation_reason.as_deref(),
        Some("change of plans")
    );
    assert_eq!(common::balance_of(&pool, &client).await?, 100_000);
    assert_eq!(common::balance_of(&pool, &provider).await?, 0);

    // Cancelling again is a benign replay
    let again = ctx
        .booking_service
        .cancel(client.id, booking.id, "again".to_string())
        .await?;
    assert_eq!(again.status, BookingStatus::Cancelled);
    assert_eq!(common::balance_of(&pool, &client).await?, 100_000);

    Ok(())
}

#[tokio::test]
async fn reschedule_settles_the_price_delta() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let client = common::create_client(&pool, 100_000).await?;
    let provider = common::create_provider(&pool, 10_000).await?;

    let booking = ctx
        .booking_service
        .create(client.id, slot(provider.id, 10, "10:00", "12:00"))
        .await?;
    assert_eq!(common::balance_of(&pool, &client).await?, 80_000);

    // Extend by an hour: 10,000 more moves into the hold
    let extended = ctx
        .booking_service
        .update(
            client.id,
            booking.id,
            UpdateBookingRequest {
                end_time: Some(t("13:00")),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(extended.total_price, 30_000);
    assert_eq!(common::balance_of(&pool, &client).await?, 70_000);

    let escrow = ctx
        .escrow_service
        .get_for_booking(booking.id)
        .await?
        .expect("escrow should exist");
    assert_eq!(escrow.amount, 30_000);

    // Shrink to one hour: the difference comes back
    let shrunk = ctx
        .booking_service
        .update(
            client.id,
            booking.id,
            UpdateBookingRequest {
                end_time: Some(t("11:00")),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(shrunk.total_price, 10_000);
    assert_eq!(common::balance_of(&pool, &client).await?, 90_000);

    Ok(())
}

#[tokio::test]
async fn unaffordable_reschedule_changes_nothing() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let client = common::create_client(&pool, 20_000).await?;
    let provider = common::create_provider(&pool, 10_000).await?;

    let booking = ctx
        .booking_service
        .create(client.id, slot(provider.id, 10, "10:00", "12:00"))
        .await?;
    assert_eq!(common::balance_of(&pool, &client).await?, 0);

    let result = ctx
        .booking_service
        .update(
            client.id,
            booking.id,
            UpdateBookingRequest {
                end_time: Some(t("13:00")),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::InsufficientFunds(_))));

    // Booking, escrow and balance all kept their old values
    let booking = ctx.booking_service.get(booking.id).await?;
    assert_eq!(booking.end_time, t("12:00"));
    assert_eq!(booking.total_price, 20_000);
    let escrow = ctx
        .escrow_service
        .get_for_booking(booking.id)
        .await?
        .expect("escrow should exist");
    assert_eq!(escrow.amount, 20_000);
    assert_eq!(common::balance_of(&pool, &client).await?, 0);

    Ok(())
}

#[tokio::test]
async fn lifecycle_permissions_and_ordering() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let client = common::create_client(&pool, 100_000).await?;
    let provider = common::create_provider(&pool, 10_000).await?;

    let booking = ctx
        .booking_service
        .create(client.id, slot(provider.id, 10, "10:00", "12:00"))
        .await?;

    // Only the payee confirms
    let wrong = ctx.booking_service.confirm(client.id, booking.id).await;
    assert!(matches!(wrong, Err(AppError::Forbidden)));

    let confirmed = ctx.booking_service.confirm(provider.id, booking.id).await?;
    assert_eq!(confirmed.status, BookingStatus::Confirmed);

    // Confirming twice is benign
    let again = ctx.booking_service.confirm(provider.id, booking.id).await?;
    assert_eq!(again.status, BookingStatus::Confirmed);

    // The appointment is 10 days out; completion must wait for its end
    let early = ctx.booking_service.complete(client.id, booking.id).await;
    assert!(matches!(early, Err(AppError::Validation(_))));

    // Outsiders touch nothing
    let outsider = common::create_client(&pool, 0).await?;
    let forbidden = ctx.booking_service.cancel(outsider.id, booking.id, "no".to_string()).await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    Ok(())
}

#[tokio::test]
async fn quote_prices_partial_hours() -> anyhow::Result<()> {
    let pool = common::setup_pool().await?;
    let ctx = common::context(&pool);
    let provider = common::create_provider(&pool, 100).await?;

    // 14:00-16:30 at 100/hour is 2.5 hours: 250
    let quote = ctx
        .booking_service
        .quote(provider.id, t("14:00"), t("16:30"))
        .await?;

    assert_eq!(quote.duration_minutes, 150);
    assert_eq!(quote.total_price, 250);

    Ok(())
}
