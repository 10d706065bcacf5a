use std::sync::Arc;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        Booking, BookingPaymentStatus, BookingStatus, EscrowStatus, EscrowTransaction,
        LedgerEntryType,
    },
    error::{AppError, Result},
    notifications::{NotificationManager, PaymentEvent},
    repository::{BookingStore, EscrowStore},
    service::wallet_service::WalletService,
};

/// Owns the Held -> Released / Held -> Refunded lifecycle. Each resolution
/// runs the escrow transition, the ledger credit and the booking settlement
/// in one transaction, and the transition itself is a guarded UPDATE, so a
/// duplicate release or refund call is a no-op rather than a double credit.
pub struct EscrowService {
    pool: SqlitePool,
    notifier: Arc<NotificationManager>,
}

impl EscrowService {
    pub fn new(pool: SqlitePool, notifier: Arc<NotificationManager>) -> Self {
        Self { pool, notifier }
    }

    /// Creates the Held escrow and debits the payer inside the caller's
    /// transaction. An insufficient-funds rejection propagates out and the
    /// caller's rollback removes the escrow row (and the booking) with it.
    pub async fn hold(
        conn: &mut SqliteConnection,
        booking: &Booking,
    ) -> Result<EscrowTransaction> {
        let id = Uuid::new_v4();
        let escrow = EscrowTransaction {
            id,
            booking_id: booking.id,
            payer_id: booking.payer_id,
            payee_id: booking.payee_id,
            amount: booking.total_price,
            refunded_amount: None,
            status: EscrowStatus::Held,
            transaction_code: format!("ESC:{}", id),
            created_at: Utc::now(),
            released_at: None,
            refunded_at: None,
        };
        EscrowStore::insert(conn, &escrow).await?;

        WalletService::debit(
            conn,
            booking.payer_id,
            booking.total_price,
            LedgerEntryType::EscrowHold,
            format!("Funds held for booking {}", booking.code),
            Some(escrow.id.to_string()),
        )
        .await?;

        tracing::info!(
            "escrow.hold: {} held for booking {} (escrow {})",
            booking.total_price,
            booking.code,
            escrow.id
        );

        Ok(escrow)
    }

    /// Credits the payee and completes the booking. Returns `Ok(false)`
    /// when no Held escrow exists for the booking, which covers both
    /// "already resolved" and "never existed" without erroring.
    pub async fn release_for_booking(&self, booking_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let Some(escrow) = EscrowStore::find_by_booking(&mut tx, booking_id).await? else {
            tracing::warn!("escrow.release: no escrow for booking {}", booking_id);
            return Ok(false);
        };

        if EscrowStore::mark_released(&mut tx, escrow.id).await? == 0 {
            tracing::info!(
                "escrow.release: escrow {} already resolved, ignoring",
                escrow.id
            );
            return Ok(false);
        }

        let booking = BookingStore::find_by_id(&mut tx, booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        WalletService::credit(
            &mut tx,
            escrow.payee_id,
            escrow.amount,
            LedgerEntryType::EscrowRelease,
            format!("Payout for booking {}", booking.code),
            Some(escrow.id.to_string()),
        )
        .await?;

        BookingStore::settle(
            &mut tx,
            booking_id,
            BookingStatus::Completed,
            BookingPaymentStatus::Settled,
            None,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            "escrow.release: {} released to {} for booking {}",
            escrow.amount,
            escrow.payee_id,
            booking.code
        );
        self.notifier
            .dispatch(PaymentEvent::EscrowReleased {
                user_id: escrow.payee_id,
                booking_code: booking.code,
                amount: escrow.amount,
            })
            .await;

        Ok(true)
    }

    /// Credits `amount` (capped at the held amount; defaults to all of it)
    /// back to the payer and cancels the booking. Already-resolved escrows
    /// return `Ok(false)`: a retried refund must not double-credit.
    pub async fn refund(
        &self,
        escrow_id: Uuid,
        amount: Option<i64>,
        reason: &str,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let escrow = EscrowStore::find_by_id(&mut tx, escrow_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Escrow transaction not found".to_string()))?;

        let refund_amount = amount.unwrap_or(escrow.amount).clamp(0, escrow.amount);

        if EscrowStore::mark_refunded(&mut tx, escrow.id, refund_amount).await? == 0 {
            tracing::info!(
                "escrow.refund: escrow {} already resolved, ignoring",
                escrow.id
            );
            return Ok(false);
        }

        let booking = BookingStore::find_by_id(&mut tx, escrow.booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))?;

        // A zero refund (inside the no-refund window) still terminates the
        // escrow; the remainder is simply never released to anyone.
        if refund_amount > 0 {
            WalletService::credit(
                &mut tx,
                escrow.payer_id,
                refund_amount,
                LedgerEntryType::EscrowRefund,
                format!("Refund for booking {} ({})", booking.code, reason),
                Some(escrow.id.to_string()),
            )
            .await?;
        }

        BookingStore::settle(
            &mut tx,
            escrow.booking_id,
            BookingStatus::Cancelled,
            BookingPaymentStatus::Refunded,
            Some(reason),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            "escrow.refund: {} of {} returned to {} for booking {}",
            refund_amount,
            escrow.amount,
            escrow.payer_id,
            booking.code
        );
        self.notifier
            .dispatch(PaymentEvent::RefundIssued {
                user_id: escrow.payer_id,
                booking_code: booking.code,
                amount: refund_amount,
            })
            .await;

        Ok(true)
    }

    pub async fn get_for_booking(&self, booking_id: Uuid) -> Result<Option<EscrowTransaction>> {
        let mut conn = self.pool.acquire().await?;
        EscrowStore::find_by_booking(&mut conn, booking_id).await
    }
}
