use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use crate::{
    domain::{Booking, BookingPaymentStatus, BookingStatus},
    error::{AppError, Result},
};

#[derive(FromRow)]
struct BookingRow {
    id: String,
    code: String,
    payer_id: String,
    payee_id: String,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    duration_minutes: i64,
    total_price: i64,
    status: String,
    payment_status: String,
    cancellation_reason: Option<String>,
    location: Option<String>,
    notes: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const BOOKING_COLUMNS: &str = r#"
    id, code, payer_id, payee_id, date, start_time, end_time,
    duration_minutes, total_price, status, payment_status,
    cancellation_reason, location, notes, created_at, updated_at
"#;

/// Booking persistence. All functions take an explicit connection so the
/// caller decides the transaction boundary; every money-moving lifecycle
/// transition runs the booking write and the ledger write in one unit.
pub struct BookingStore;

impl BookingStore {
    fn row_to_booking(row: BookingRow) -> Result<Booking> {
        Ok(Booking {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            code: row.code,
            payer_id: Uuid::parse_str(&row.payer_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            payee_id: Uuid::parse_str(&row.payee_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            duration_minutes: row.duration_minutes,
            total_price: row.total_price,
            status: Self::parse_status(&row.status)?,
            payment_status: Self::parse_payment_status(&row.payment_status)?,
            cancellation_reason: row.cancellation_reason,
            location: row.location,
            notes: row.notes,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_status(s: &str) -> Result<BookingStatus> {
        match s {
            "Pending" => Ok(BookingStatus::Pending),
            "Confirmed" => Ok(BookingStatus::Confirmed),
            "Completed" => Ok(BookingStatus::Completed),
            "Cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err(AppError::Database(format!("Invalid booking status: {}", s))),
        }
    }

    pub(crate) fn status_to_str(status: &BookingStatus) -> &'static str {
        match status {
            BookingStatus::Pending => "Pending",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    fn parse_payment_status(s: &str) -> Result<BookingPaymentStatus> {
        match s {
            "Held" => Ok(BookingPaymentStatus::Held),
            "Settled" => Ok(BookingPaymentStatus::Settled),
            "Refunded" => Ok(BookingPaymentStatus::Refunded),
            _ => Err(AppError::Database(format!(
                "Invalid booking payment status: {}",
                s
            ))),
        }
    }

    fn payment_status_to_str(status: &BookingPaymentStatus) -> &'static str {
        match status {
            BookingPaymentStatus::Held => "Held",
            BookingPaymentStatus::Settled => "Settled",
            BookingPaymentStatus::Refunded => "Refunded",
        }
    }

    pub async fn insert(conn: &mut SqliteConnection, booking: &Booking) -> Result<()> {
        let status_str = Self::status_to_str(&booking.status);
        let payment_status_str = Self::payment_status_to_str(&booking.payment_status);

        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, code, payer_id, payee_id, date, start_time, end_time,
                duration_minutes, total_price, status, payment_status,
                cancellation_reason, location, notes, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(booking.id.to_string())
        .bind(&booking.code)
        .bind(booking.payer_id.to_string())
        .bind(booking.payee_id.to_string())
        .bind(booking.date)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.duration_minutes)
        .bind(booking.total_price)
        .bind(status_str)
        .bind(payment_status_str)
        .bind(&booking.cancellation_reason)
        .bind(&booking.location)
        .bind(&booking.notes)
        .bind(booking.created_at.naive_utc())
        .bind(booking.updated_at.naive_utc())
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    pub async fn find_by_id(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = ?",
            BOOKING_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_code(conn: &mut SqliteConnection, code: &str) -> Result<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE code = ?",
            BOOKING_COLUMNS
        ))
        .bind(code)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    /// Every non-cancelled booking occupying the payee's calendar on a date.
    pub async fn list_active_for_payee_on_date(
        conn: &mut SqliteConnection,
        payee_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE payee_id = ? AND date = ? AND status != 'Cancelled'
            ORDER BY start_time ASC
            "#,
            BOOKING_COLUMNS
        ))
        .bind(payee_id.to_string())
        .bind(date)
        .fetch_all(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    pub async fn count_active_for_payer_on_date(
        conn: &mut SqliteConnection,
        payer_id: Uuid,
        date: NaiveDate,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE payer_id = ? AND date = ? AND status IN ('Pending', 'Confirmed')
            "#,
        )
        .bind(payer_id.to_string())
        .bind(date)
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count)
    }

    pub async fn count_pending_for_payer(
        conn: &mut SqliteConnection,
        payer_id: Uuid,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE payer_id = ? AND status = 'Pending'",
        )
        .bind(payer_id.to_string())
        .fetch_one(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count)
    }

    pub async fn list_for_user(
        conn: &mut SqliteConnection,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>> {
        let id_str = user_id.to_string();
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE payer_id = ? OR payee_id = ?
            ORDER BY date DESC, start_time DESC
            LIMIT ? OFFSET ?
            "#,
            BOOKING_COLUMNS
        ))
        .bind(&id_str)
        .bind(&id_str)
        .bind(limit)
        .bind(offset)
        .fetch_all(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_booking).collect()
    }

    /// Guarded status transition; affects no row unless the booking is still
    /// in `from`, which is what makes duplicate lifecycle calls benign.
    pub async fn transition_status(
        conn: &mut SqliteConnection,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE bookings SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(Self::status_to_str(&to))
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .bind(Self::status_to_str(&from))
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Terminal settlement used by escrow resolution: flips lifecycle and
    /// payment status together.
    pub async fn settle(
        conn: &mut SqliteConnection,
        id: Uuid,
        status: BookingStatus,
        payment_status: BookingPaymentStatus,
        cancellation_reason: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET status = ?,
                payment_status = ?,
                cancellation_reason = COALESCE(?, cancellation_reason),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Self::status_to_str(&status))
        .bind(Self::payment_status_to_str(&payment_status))
        .bind(cancellation_reason)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Rewrites the schedulable fields after a validated update. Price and
    /// duration move together with the times.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_schedule(
        conn: &mut SqliteConnection,
        id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        duration_minutes: i64,
        total_price: i64,
        location: Option<&str>,
        notes: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET date = ?,
                start_time = ?,
                end_time = ?,
                duration_minutes = ?,
                total_price = ?,
                location = COALESCE(?, location),
                notes = COALESCE(?, notes),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(date)
        .bind(start_time)
        .bind(end_time)
        .bind(duration_minutes)
        .bind(total_price)
        .bind(location)
        .bind(notes)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
