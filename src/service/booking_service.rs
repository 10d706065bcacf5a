use std::sync::Arc;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    domain::{
        Booking, BookingPaymentStatus, BookingStatus, CreateBookingRequest, EscrowStatus,
        LedgerEntryType, UpdateBookingRequest, User,
    },
    error::{AppError, Result},
    notifications::{NotificationManager, PaymentEvent},
    repository::{BookingStore, EscrowStore, UserRepository},
    service::{
        booking_validator::BookingValidator, escrow_service::EscrowService, refund_policy,
        wallet_service::WalletService,
    },
};

/// The booking lifecycle: Pending -> Confirmed -> Completed, with
/// cancellation out of Pending or Confirmed. Money only moves through the
/// escrow service and the ledger; this service decides when.
pub struct BookingService {
    pool: SqlitePool,
    users: Arc<dyn UserRepository>,
    validator: BookingValidator,
    escrow: Arc<EscrowService>,
    notifier: Arc<NotificationManager>,
}

#[derive(Debug, Serialize)]
pub struct PriceQuote {
    pub payee_id: Uuid,
    pub hourly_rate: i64,
    pub duration_minutes: i64,
    pub total_price: i64,
}

/// Whole-unit price for a duration at an hourly rate, rounded half-up.
pub fn calculate_price(hourly_rate: i64, duration_minutes: i64) -> i64 {
    (hourly_rate * duration_minutes + 30) / 60
}

fn booking_code() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("BK-{}", suffix)
}

impl BookingService {
    pub fn new(
        pool: SqlitePool,
        users: Arc<dyn UserRepository>,
        validator: BookingValidator,
        escrow: Arc<EscrowService>,
        notifier: Arc<NotificationManager>,
    ) -> Self {
        Self {
            pool,
            users,
            validator,
            escrow,
            notifier,
        }
    }

    async fn load_user(&self, id: Uuid, what: &str) -> Result<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} not found", what)))
    }

    pub async fn get(&self, id: Uuid) -> Result<Booking> {
        let mut conn = self.pool.acquire().await?;
        BookingStore::find_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    pub async fn list_for_user(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<Booking>> {
        let mut conn = self.pool.acquire().await?;
        BookingStore::list_for_user(&mut conn, user_id, limit, offset).await
    }

    pub async fn quote(
        &self,
        payee_id: Uuid,
        start: chrono::NaiveTime,
        end: chrono::NaiveTime,
    ) -> Result<PriceQuote> {
        if end <= start {
            return Err(AppError::Validation(
                "End time must be after start time".to_string(),
            ));
        }
        let payee = self.load_user(payee_id, "Provider").await?;
        let hourly_rate = payee.hourly_rate.ok_or_else(|| {
            AppError::Validation("This provider has not published a rate".to_string())
        })?;
        let duration_minutes = (end - start).num_minutes();
        Ok(PriceQuote {
            payee_id,
            hourly_rate,
            duration_minutes,
            total_price: calculate_price(hourly_rate, duration_minutes),
        })
    }

    /// Validates, prices, then creates the booking and its escrow hold as
    /// one transaction. If the payer cannot cover the hold the whole unit
    /// rolls back and no booking exists afterwards.
    pub async fn create(
        &self,
        requester_id: Uuid,
        request: CreateBookingRequest,
    ) -> Result<Booking> {
        let requester = self.load_user(requester_id, "Requester").await?;
        let payee = self.load_user(request.payee_id, "Provider").await?;

        let (payee_day, active_today, pending) = {
            let mut conn = self.pool.acquire().await?;
            let day = BookingStore::list_active_for_payee_on_date(
                &mut conn,
                request.payee_id,
                request.date,
            )
            .await?;
            let active = BookingStore::count_active_for_payer_on_date(
                &mut conn,
                requester_id,
                request.date,
            )
            .await?;
            let pending = BookingStore::count_pending_for_payer(&mut conn, requester_id).await?;
            (day, active, pending)
        };

        self.validator.validate(
            &requester,
            &payee,
            request.date,
            request.start_time,
            request.end_time,
            Utc::now(),
            &payee_day,
            active_today,
            pending,
            None,
        )?;

        let hourly_rate = payee
            .hourly_rate
            .ok_or_else(|| AppError::Internal("Provider rate disappeared".to_string()))?;
        let duration_minutes = (request.end_time - request.start_time).num_minutes();
        let total_price = calculate_price(hourly_rate, duration_minutes);
        let now = Utc::now();

        let booking = Booking {
            id: Uuid::new_v4(),
            code: booking_code(),
            payer_id: requester_id,
            payee_id: request.payee_id,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            duration_minutes,
            total_price,
            status: BookingStatus::Pending,
            payment_status: BookingPaymentStatus::Held,
            cancellation_reason: None,
            location: request.location,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        BookingStore::insert(&mut tx, &booking).await?;
        EscrowService::hold(&mut tx, &booking).await?;
        tx.commit().await?;

        tracing::info!(
            "booking.create: {} for payee {} on {} ({} units held)",
            booking.code,
            booking.payee_id,
            booking.date,
            total_price
        );
        self.notifier
            .dispatch(PaymentEvent::BookingHeld {
                user_id: booking.payer_id,
                booking_code: booking.code.clone(),
                amount: total_price,
            })
            .await;

        Ok(booking)
    }

    /// Reschedule or annotate a still-pending booking. A schedule change
    /// re-validates conflicts and reprices; the price delta settles
    /// immediately against the payer's wallet and the held escrow, and an
    /// unaffordable increase rejects the update leaving everything as it
    /// was.
    pub async fn update(
        &self,
        actor_id: Uuid,
        booking_id: Uuid,
        request: UpdateBookingRequest,
    ) -> Result<Booking> {
        let booking = self.get(booking_id).await?;

        if booking.payer_id != actor_id {
            return Err(AppError::Forbidden);
        }
        if booking.status != BookingStatus::Pending {
            return Err(AppError::WrongState(
                "Only pending bookings can be changed".to_string(),
            ));
        }

        let date = request.date.unwrap_or(booking.date);
        let start = request.start_time.unwrap_or(booking.start_time);
        let end = request.end_time.unwrap_or(booking.end_time);

        let (duration_minutes, total_price) = if request.changes_schedule() {
            let requester = self.load_user(booking.payer_id, "Requester").await?;
            let payee = self.load_user(booking.payee_id, "Provider").await?;

            let (payee_day, active_today, pending) = {
                let mut conn = self.pool.acquire().await?;
                let day =
                    BookingStore::list_active_for_payee_on_date(&mut conn, booking.payee_id, date)
                        .await?;
                let active = BookingStore::count_active_for_payer_on_date(
                    &mut conn,
                    booking.payer_id,
                    date,
                )
                .await?;
                let pending =
                    BookingStore::count_pending_for_payer(&mut conn, booking.payer_id).await?;
                (day, active, pending)
            };

            self.validator.validate(
                &requester,
                &payee,
                date,
                start,
                end,
                Utc::now(),
                &payee_day,
                active_today,
                pending,
                Some(booking.id),
            )?;

            let hourly_rate = payee
                .hourly_rate
                .ok_or_else(|| AppError::Internal("Provider rate disappeared".to_string()))?;
            let minutes = (end - start).num_minutes();
            (minutes, calculate_price(hourly_rate, minutes))
        } else {
            (booking.duration_minutes, booking.total_price)
        };

        let delta = total_price - booking.total_price;

        let mut tx = self.pool.begin().await?;

        if delta != 0 {
            let escrow = EscrowStore::find_by_booking(&mut tx, booking.id)
                .await?
                .ok_or_else(|| AppError::NotFound("Escrow transaction not found".to_string()))?;
            if escrow.status != EscrowStatus::Held {
                return Err(AppError::WrongState(
                    "The booking's funds are no longer held".to_string(),
                ));
            }

            if delta > 0 {
                WalletService::debit(
                    &mut tx,
                    booking.payer_id,
                    delta,
                    LedgerEntryType::BookingAdjustment,
                    format!("Price adjustment for booking {}", booking.code),
                    Some(booking.id.to_string()),
                )
                .await?;
            } else {
                WalletService::credit(
                    &mut tx,
                    booking.payer_id,
                    -delta,
                    LedgerEntryType::BookingRefund,
                    format!("Price reduction for booking {}", booking.code),
                    Some(booking.id.to_string()),
                )
                .await?;
            }

            EscrowStore::update_amount(&mut tx, escrow.id, total_price).await?;
        }

        BookingStore::update_schedule(
            &mut tx,
            booking.id,
            date,
            start,
            end,
            duration_minutes,
            total_price,
            request.location.as_deref(),
            request.notes.as_deref(),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            "booking.update: {} rescheduled to {} {}-{} (price delta {})",
            booking.code,
            date,
            start,
            end,
            delta
        );

        self.get(booking.id).await
    }

    /// Payee accepts. No funds move; they are already held.
    pub async fn confirm(&self, actor_id: Uuid, booking_id: Uuid) -> Result<Booking> {
        let booking = self.get(booking_id).await?;

        if booking.payee_id != actor_id {
            return Err(AppError::Forbidden);
        }
        match booking.status {
            BookingStatus::Pending => {}
            // A retried confirm is benign
            BookingStatus::Confirmed => return Ok(booking),
            _ => {
                return Err(AppError::WrongState(
                    "Booking can no longer be confirmed".to_string(),
                ))
            }
        }

        let mut conn = self.pool.acquire().await?;
        let moved = BookingStore::transition_status(
            &mut conn,
            booking.id,
            BookingStatus::Pending,
            BookingStatus::Confirmed,
        )
        .await?;
        drop(conn);

        let booking = self.get(booking.id).await?;
        if moved == 0 && booking.status != BookingStatus::Confirmed {
            return Err(AppError::WrongState(
                "Booking can no longer be confirmed".to_string(),
            ));
        }

        tracing::info!("booking.confirm: {} confirmed by payee", booking.code);
        Ok(booking)
    }

    /// Either party marks the appointment done once its scheduled end has
    /// passed; the escrow releases to the payee. A duplicate completion
    /// finds no Held escrow and falls through as success.
    pub async fn complete(&self, actor_id: Uuid, booking_id: Uuid) -> Result<Booking> {
        let booking = self.get(booking_id).await?;

        if booking.payer_id != actor_id && booking.payee_id != actor_id {
            return Err(AppError::Forbidden);
        }
        match booking.status {
            BookingStatus::Confirmed => {}
            BookingStatus::Completed => return Ok(booking),
            _ => {
                return Err(AppError::WrongState(
                    "Only confirmed bookings can be completed".to_string(),
                ))
            }
        }
        if Utc::now().naive_utc() < booking.ends_at() {
            return Err(AppError::Validation(
                "The appointment has not ended yet".to_string(),
            ));
        }

        let released = self.escrow.release_for_booking(booking.id).await?;
        if !released {
            tracing::info!(
                "booking.complete: {} had no held escrow, treating as already settled",
                booking.code
            );
        }

        self.get(booking.id).await
    }

    /// Either party backs out. The refund follows the time-banded policy;
    /// whatever is withheld is never released to the payee.
    pub async fn cancel(
        &self,
        actor_id: Uuid,
        booking_id: Uuid,
        reason: String,
    ) -> Result<Booking> {
        let booking = self.get(booking_id).await?;

        if booking.payer_id != actor_id && booking.payee_id != actor_id {
            return Err(AppError::Forbidden);
        }
        match booking.status {
            BookingStatus::Pending | BookingStatus::Confirmed => {}
            BookingStatus::Cancelled => return Ok(booking),
            BookingStatus::Completed => {
                return Err(AppError::WrongState(
                    "Completed bookings cannot be cancelled".to_string(),
                ))
            }
        }

        let minutes_until_start = (booking.starts_at() - Utc::now().naive_utc()).num_minutes();
        let refund = refund_policy::refund_amount(booking.total_price, minutes_until_start);

        match self.escrow.get_for_booking(booking.id).await? {
            Some(escrow) => {
                let refunded = self.escrow.refund(escrow.id, Some(refund), &reason).await?;
                if !refunded {
                    tracing::info!(
                        "booking.cancel: {} escrow already resolved, ignoring",
                        booking.code
                    );
                }
            }
            None => {
                // No escrow should only happen for legacy rows; cancel the
                // booking anyway so the slot frees up.
                tracing::warn!("booking.cancel: {} has no escrow", booking.code);
                let mut tx = self.pool.begin().await?;
                BookingStore::settle(
                    &mut tx,
                    booking.id,
                    BookingStatus::Cancelled,
                    BookingPaymentStatus::Refunded,
                    Some(&reason),
                )
                .await?;
                tx.commit().await?;
            }
        }

        tracing::info!(
            "booking.cancel: {} cancelled ({} of {} refunded)",
            booking.code,
            refund,
            booking.total_price
        );

        self.get(booking.id).await
    }
}

#[cfg(test)]
mod tests {
    use super::calculate_price;

    #[test]
    fn price_is_rate_times_hours() {
        // 14:00-16:30 at 100/hour -> 2.5h -> 250
        assert_eq!(calculate_price(100, 150), 250);
        assert_eq!(calculate_price(10_000, 60), 10_000);
        assert_eq!(calculate_price(10_000, 90), 15_000);
    }

    #[test]
    fn price_rounds_half_up_to_whole_units() {
        // 100/hour for 1 minute = 1.66.. -> 2
        assert_eq!(calculate_price(100, 1), 2);
        // 100/hour for 15 minutes = 25 exactly
        assert_eq!(calculate_price(100, 15), 25);
        // 99/hour for 20 minutes = 33 exactly
        assert_eq!(calculate_price(99, 20), 33);
        // 50/hour for 1 minute = 0.83.. -> 1
        assert_eq!(calculate_price(50, 1), 1);
    }
}
