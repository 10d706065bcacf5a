use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use crate::{
    domain::{EscrowStatus, EscrowTransaction},
    error::{AppError, Result},
};

#[derive(FromRow)]
struct EscrowRow {
    id: String,
    booking_id: String,
    payer_id: String,
    payee_id: String,
    amount: i64,
    refunded_amount: Option<i64>,
    status: String,
    transaction_code: String,
    created_at: NaiveDateTime,
    released_at: Option<NaiveDateTime>,
    refunded_at: Option<NaiveDateTime>,
}

const ESCROW_COLUMNS: &str = r#"
    id, booking_id, payer_id, payee_id, amount, refunded_amount,
    status, transaction_code, created_at, released_at, refunded_at
"#;

/// Escrow persistence. The terminal transitions are guarded UPDATEs on
/// `status = 'Held'`; a transition that affects no row means another call
/// already resolved the escrow.
pub struct EscrowStore;

impl EscrowStore {
    fn row_to_escrow(row: EscrowRow) -> Result<EscrowTransaction> {
        Ok(EscrowTransaction {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            booking_id: Uuid::parse_str(&row.booking_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            payer_id: Uuid::parse_str(&row.payer_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            payee_id: Uuid::parse_str(&row.payee_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            amount: row.amount,
            refunded_amount: row.refunded_amount,
            status: Self::parse_status(&row.status)?,
            transaction_code: row.transaction_code,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            released_at: row
                .released_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            refunded_at: row
                .refunded_at
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
        })
    }

    fn parse_status(s: &str) -> Result<EscrowStatus> {
        match s {
            "Held" => Ok(EscrowStatus::Held),
            "Released" => Ok(EscrowStatus::Released),
            "Refunded" => Ok(EscrowStatus::Refunded),
            _ => Err(AppError::Database(format!("Invalid escrow status: {}", s))),
        }
    }

    pub async fn insert(conn: &mut SqliteConnection, escrow: &EscrowTransaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO escrow_transactions (
                id, booking_id, payer_id, payee_id, amount, refunded_amount,
                status, transaction_code, created_at, released_at, refunded_at
            ) VALUES (?, ?, ?, ?, ?, ?, 'Held', ?, ?, NULL, NULL)
            "#,
        )
        .bind(escrow.id.to_string())
        .bind(escrow.booking_id.to_string())
        .bind(escrow.payer_id.to_string())
        .bind(escrow.payee_id.to_string())
        .bind(escrow.amount)
        .bind(escrow.refunded_amount)
        .bind(&escrow.transaction_code)
        .bind(escrow.created_at.naive_utc())
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    pub async fn find_by_id(
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<Option<EscrowTransaction>> {
        let row = sqlx::query_as::<_, EscrowRow>(&format!(
            "SELECT {} FROM escrow_transactions WHERE id = ?",
            ESCROW_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_escrow(r)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_booking(
        conn: &mut SqliteConnection,
        booking_id: Uuid,
    ) -> Result<Option<EscrowTransaction>> {
        let row = sqlx::query_as::<_, EscrowRow>(&format!(
            "SELECT {} FROM escrow_transactions WHERE booking_id = ?",
            ESCROW_COLUMNS
        ))
        .bind(booking_id.to_string())
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_escrow(r)?)),
            None => Ok(None),
        }
    }

    /// Held -> Released. Returns the number of rows moved (0 or 1).
    pub async fn mark_released(conn: &mut SqliteConnection, id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE escrow_transactions
            SET status = 'Released', released_at = ?
            WHERE id = ? AND status = 'Held'
            "#,
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Held -> Refunded, recording how much of the hold went back.
    pub async fn mark_refunded(
        conn: &mut SqliteConnection,
        id: Uuid,
        refunded_amount: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE escrow_transactions
            SET status = 'Refunded', refunded_amount = ?, refunded_at = ?
            WHERE id = ? AND status = 'Held'
            "#,
        )
        .bind(refunded_amount)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Reprice a still-held escrow after a booking update.
    pub async fn update_amount(
        conn: &mut SqliteConnection,
        id: Uuid,
        amount: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE escrow_transactions SET amount = ? WHERE id = ? AND status = 'Held'",
        )
        .bind(amount)
        .bind(id.to_string())
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
