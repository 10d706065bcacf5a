use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::actor::CurrentActor, state::AppState},
    domain::{Booking, BookingPaymentStatus, BookingStatus, CreateBookingRequest, UpdateBookingRequest},
    error::{AppError, Result},
    service::PriceQuote,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct BookingDto {
    id: Uuid,
    code: String,
    payer_id: Uuid,
    payee_id: Uuid,
    date: NaiveDate,
    start_time: String,
    end_time: String,
    duration_minutes: i64,
    total_price: i64,
    status: BookingStatus,
    payment_status: BookingPaymentStatus,
    cancellation_reason: Option<String>,
    location: Option<String>,
    notes: Option<String>,
    created_at: String,
}

impl From<Booking> for BookingDto {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            code: booking.code,
            payer_id: booking.payer_id,
            payee_id: booking.payee_id,
            date: booking.date,
            start_time: booking.start_time.format("%H:%M").to_string(),
            end_time: booking.end_time.format("%H:%M").to_string(),
            duration_minutes: booking.duration_minutes,
            total_price: booking.total_price,
            status: booking.status,
            payment_status: booking.payment_status,
            cancellation_reason: booking.cancellation_reason,
            location: booking.location,
            notes: booking.notes,
            created_at: booking.created_at.to_rfc3339(),
        }
    }
}

fn parse_time(value: &str, field: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| AppError::Validation(format!("{} must be HH:MM", field)))
}

fn ensure_party(booking: &Booking, actor: &CurrentActor) -> Result<()> {
    if booking.payer_id != actor.user.id && booking.payee_id != actor.user.id {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingDto {
    payee_id: Uuid,
    date: NaiveDate,
    start_time: String,
    end_time: String,
    location: Option<String>,
    notes: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Json(dto): Json<CreateBookingDto>,
) -> Result<(StatusCode, Json<BookingDto>)> {
    let request = CreateBookingRequest {
        payee_id: dto.payee_id,
        date: dto.date,
        start_time: parse_time(&dto.start_time, "start_time")?,
        end_time: parse_time(&dto.end_time, "end_time")?,
        location: dto.location,
        notes: dto.notes,
    };

    let booking = state
        .service_context
        .booking_service
        .create(actor.user.id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(booking.into())))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let booking = state.service_context.booking_service.get(id).await?;
    ensure_party(&booking, &actor)?;
    Ok(Json(booking.into()))
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    bookings: Vec<BookingDto>,
    total: usize,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let bookings = state
        .service_context
        .booking_service
        .list_for_user(actor.user.id, params.limit, params.offset)
        .await?;

    let total = bookings.len();
    let bookings: Vec<BookingDto> = bookings.into_iter().map(Into::into).collect();

    Ok(Json(ListResponse { bookings, total }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateBookingDto {
    date: Option<NaiveDate>,
    start_time: Option<String>,
    end_time: Option<String>,
    location: Option<String>,
    notes: Option<String>,
}

pub async fn update(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
    Json(dto): Json<UpdateBookingDto>,
) -> Result<Json<BookingDto>> {
    let request = UpdateBookingRequest {
        date: dto.date,
        start_time: dto
            .start_time
            .as_deref()
            .map(|t| parse_time(t, "start_time"))
            .transpose()?,
        end_time: dto
            .end_time
            .as_deref()
            .map(|t| parse_time(t, "end_time"))
            .transpose()?,
        location: dto.location,
        notes: dto.notes,
    };

    let booking = state
        .service_context
        .booking_service
        .update(actor.user.id, id, request)
        .await?;

    Ok(Json(booking.into()))
}

pub async fn confirm(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let booking = state
        .service_context
        .booking_service
        .confirm(actor.user.id, id)
        .await?;

    Ok(Json(booking.into()))
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingDto>> {
    let booking = state
        .service_context
        .booking_service
        .complete(actor.user.id, id)
        .await?;

    Ok(Json(booking.into()))
}

#[derive(Debug, Deserialize)]
pub struct CancelBookingDto {
    reason: Option<String>,
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentActor>,
    Path(id): Path<Uuid>,
    Json(dto): Json<CancelBookingDto>,
) -> Result<Json<BookingDto>> {
    let reason = dto
        .reason
        .unwrap_or_else(|| "Cancelled by user".to_string());

    let booking = state
        .service_context
        .booking_service
        .cancel(actor.user.id, id, reason)
        .await?;

    Ok(Json(booking.into()))
}

#[derive(Debug, Deserialize)]
pub struct QuoteDto {
    payee_id: Uuid,
    start_time: String,
    end_time: String,
}

pub async fn quote(
    State(state): State<AppState>,
    Extension(_actor): Extension<CurrentActor>,
    Json(dto): Json<QuoteDto>,
) -> Result<Json<PriceQuote>> {
    let start = parse_time(&dto.start_time, "start_time")?;
    let end = parse_time(&dto.end_time, "end_time")?;

    let quote = state
        .service_context
        .booking_service
        .quote(dto.payee_id, start, end)
        .await?;

    Ok(Json(quote))
}
