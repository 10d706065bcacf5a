use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One per user, lazily created on the first credit. The balance is whole
/// currency units and must never go negative; every change to it is paired
/// with exactly one ledger entry whose `balance_after` equals the new value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAccount {
    pub user_id: Uuid,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

/// Append-only record of a balance-affecting (or pending-to-affect) event.
/// Entries are the source of truth for balance reconstruction and for
/// idempotency: `transaction_code` carries a uniqueness constraint, and
/// singleton entry types derive it from their reference so a replayed
/// mutation collides instead of double-applying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletLedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub transaction_code: String,
    pub entry_type: LedgerEntryType,
    pub amount: i64,
    pub description: String,
    pub reference_id: Option<String>,
    pub status: LedgerEntryStatus,
    pub balance_after: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "TEXT")]
pub enum LedgerEntryType {
    TopUp,
    TopUpPending,
    BookingPayment,
    BookingRefund,
    BookingAdjustment,
    EscrowHold,
    EscrowRelease,
    EscrowRefund,
}

impl LedgerEntryType {
    /// Entry types that occur at most once per reference. These get a
    /// deterministic transaction code so the unique index doubles as the
    /// replay guard. Adjustments and refunds can legitimately repeat for
    /// the same booking and keep random codes.
    pub fn singleton_per_reference(&self) -> bool {
        matches!(
            self,
            LedgerEntryType::TopUp
                | LedgerEntryType::TopUpPending
                | LedgerEntryType::EscrowHold
                | LedgerEntryType::EscrowRelease
                | LedgerEntryType::EscrowRefund
        )
    }

    pub fn code_prefix(&self) -> &'static str {
        match self {
            LedgerEntryType::TopUp => "TOPUP",
            LedgerEntryType::TopUpPending => "TOPUP",
            LedgerEntryType::BookingPayment => "BPAY",
            LedgerEntryType::BookingRefund => "BREF",
            LedgerEntryType::BookingAdjustment => "BADJ",
            LedgerEntryType::EscrowHold => "EHOLD",
            LedgerEntryType::EscrowRelease => "EREL",
            LedgerEntryType::EscrowRefund => "EREF",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "TEXT")]
pub enum LedgerEntryStatus {
    Pending,
    Completed,
    Failed,
}
