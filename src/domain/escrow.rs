use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Funds debited from the payer and held against a single booking until the
/// appointment completes (credited to the payee) or is cancelled (credited
/// back to the payer, possibly partially). One escrow per booking, terminal
/// once Released or Refunded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowTransaction {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payer_id: Uuid,
    pub payee_id: Uuid,
    pub amount: i64,
    pub refunded_amount: Option<i64>,
    pub status: EscrowStatus,
    pub transaction_code: String,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "TEXT")]
pub enum EscrowStatus {
    Held,
    Released,
    Refunded,
}
