use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use crate::{
    domain::{LedgerEntryStatus, LedgerEntryType, WalletAccount, WalletLedgerEntry},
    error::{AppError, Result},
};

#[derive(FromRow)]
struct AccountRow {
    user_id: String,
    balance: i64,
    updated_at: NaiveDateTime,
}

#[derive(FromRow)]
struct LedgerRow {
    id: String,
    user_id: String,
    transaction_code: String,
    entry_type: String,
    amount: i64,
    description: String,
    reference_id: Option<String>,
    status: String,
    balance_after: Option<i64>,
    created_at: NaiveDateTime,
}

const LEDGER_COLUMNS: &str = r#"
    id, user_id, transaction_code, entry_type, amount, description,
    reference_id, status, balance_after, created_at
"#;

/// Account and ledger persistence. The balance check-then-decrement is a
/// single guarded UPDATE so two racing debits can never both observe a
/// balance that permits overdraft.
pub struct WalletStore;

impl WalletStore {
    fn row_to_account(row: AccountRow) -> Result<WalletAccount> {
        Ok(WalletAccount {
            user_id: Uuid::parse_str(&row.user_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            balance: row.balance,
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn row_to_entry(row: LedgerRow) -> Result<WalletLedgerEntry> {
        Ok(WalletLedgerEntry {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id)
                .map_err(|e| AppError::Database(e.to_string()))?,
            transaction_code: row.transaction_code,
            entry_type: Self::parse_entry_type(&row.entry_type)?,
            amount: row.amount,
            description: row.description,
            reference_id: row.reference_id,
            status: Self::parse_entry_status(&row.status)?,
            balance_after: row.balance_after,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }

    fn parse_entry_type(s: &str) -> Result<LedgerEntryType> {
        match s {
            "TopUp" => Ok(LedgerEntryType::TopUp),
            "TopUpPending" => Ok(LedgerEntryType::TopUpPending),
            "BookingPayment" => Ok(LedgerEntryType::BookingPayment),
            "BookingRefund" => Ok(LedgerEntryType::BookingRefund),
            "BookingAdjustment" => Ok(LedgerEntryType::BookingAdjustment),
            "EscrowHold" => Ok(LedgerEntryType::EscrowHold),
            "EscrowRelease" => Ok(LedgerEntryType::EscrowRelease),
            "EscrowRefund" => Ok(LedgerEntryType::EscrowRefund),
            _ => Err(AppError::Database(format!("Invalid ledger entry type: {}", s))),
        }
    }

    pub(crate) fn entry_type_to_str(entry_type: &LedgerEntryType) -> &'static str {
        match entry_type {
            LedgerEntryType::TopUp => "TopUp",
            LedgerEntryType::TopUpPending => "TopUpPending",
            LedgerEntryType::BookingPayment => "BookingPayment",
            LedgerEntryType::BookingRefund => "BookingRefund",
            LedgerEntryType::BookingAdjustment => "BookingAdjustment",
            LedgerEntryType::EscrowHold => "EscrowHold",
            LedgerEntryType::EscrowRelease => "EscrowRelease",
            LedgerEntryType::EscrowRefund => "EscrowRefund",
        }
    }

    fn parse_entry_status(s: &str) -> Result<LedgerEntryStatus> {
        match s {
            "Pending" => Ok(LedgerEntryStatus::Pending),
            "Completed" => Ok(LedgerEntryStatus::Completed),
            "Failed" => Ok(LedgerEntryStatus::Failed),
            _ => Err(AppError::Database(format!(
                "Invalid ledger entry status: {}",
                s
            ))),
        }
    }

    fn entry_status_to_str(status: &LedgerEntryStatus) -> &'static str {
        match status {
            LedgerEntryStatus::Pending => "Pending",
            LedgerEntryStatus::Completed => "Completed",
            LedgerEntryStatus::Failed => "Failed",
        }
    }

    pub async fn find_account(
        conn: &mut SqliteConnection,
        user_id: Uuid,
    ) -> Result<Option<WalletAccount>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT user_id, balance, updated_at FROM wallet_accounts WHERE user_id = ?",
        )
        .bind(user_id.to_string())
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_account(r)?)),
            None => Ok(None),
        }
    }

    pub async fn balance_of(conn: &mut SqliteConnection, user_id: Uuid) -> Result<i64> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM wallet_accounts WHERE user_id = ?")
                .bind(user_id.to_string())
                .fetch_optional(conn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(balance.unwrap_or(0))
    }

    /// Atomic check-then-decrement. Returns false when the account is
    /// missing or the balance would go negative; no row is touched then.
    pub async fn try_debit(
        conn: &mut SqliteConnection,
        user_id: Uuid,
        amount: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE wallet_accounts
            SET balance = balance - ?, updated_at = ?
            WHERE user_id = ? AND balance >= ?
            "#,
        )
        .bind(amount)
        .bind(Utc::now().naive_utc())
        .bind(user_id.to_string())
        .bind(amount)
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Upsert credit; creates the account on first use.
    pub async fn credit(conn: &mut SqliteConnection, user_id: Uuid, amount: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_accounts (user_id, balance, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE
            SET balance = balance + excluded.balance,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id.to_string())
        .bind(amount)
        .bind(Utc::now().naive_utc())
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    pub async fn insert_entry(
        conn: &mut SqliteConnection,
        entry: &WalletLedgerEntry,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_ledger (
                id, user_id, transaction_code, entry_type, amount,
                description, reference_id, status, balance_after, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.user_id.to_string())
        .bind(&entry.transaction_code)
        .bind(Self::entry_type_to_str(&entry.entry_type))
        .bind(entry.amount)
        .bind(&entry.description)
        .bind(&entry.reference_id)
        .bind(Self::entry_status_to_str(&entry.status))
        .bind(entry.balance_after)
        .bind(entry.created_at.naive_utc())
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    pub async fn find_completed_by_reference(
        conn: &mut SqliteConnection,
        reference_id: &str,
        entry_type: LedgerEntryType,
    ) -> Result<Option<WalletLedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerRow>(&format!(
            r#"
            SELECT {} FROM wallet_ledger
            WHERE reference_id = ? AND entry_type = ? AND status = 'Completed'
            "#,
            LEDGER_COLUMNS
        ))
        .bind(reference_id)
        .bind(Self::entry_type_to_str(&entry_type))
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_entry(r)?)),
            None => Ok(None),
        }
    }

    /// Top-up lookup across both the pending and the settled shape of the
    /// entry, so webhook replays after completion still resolve.
    pub async fn find_top_up_by_reference(
        conn: &mut SqliteConnection,
        reference_id: &str,
    ) -> Result<Option<WalletLedgerEntry>> {
        let row = sqlx::query_as::<_, LedgerRow>(&format!(
            r#"
            SELECT {} FROM wallet_ledger
            WHERE reference_id = ? AND entry_type IN ('TopUp', 'TopUpPending')
            "#,
            LEDGER_COLUMNS
        ))
        .bind(reference_id)
        .fetch_optional(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        match row {
            Some(r) => Ok(Some(Self::row_to_entry(r)?)),
            None => Ok(None),
        }
    }

    /// Settles a pending top-up entry in place: the TopUpPending record
    /// becomes the one Completed TopUp entry that accompanies the credit.
    pub async fn complete_top_up_entry(
        conn: &mut SqliteConnection,
        entry_id: Uuid,
        balance_after: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE wallet_ledger
            SET entry_type = 'TopUp', status = 'Completed', balance_after = ?
            WHERE id = ?
            "#,
        )
        .bind(balance_after)
        .bind(entry_id.to_string())
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    pub async fn fail_top_up_entry(
        conn: &mut SqliteConnection,
        entry_id: Uuid,
        description: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE wallet_ledger SET status = 'Failed', description = ? WHERE id = ?",
        )
        .bind(description)
        .bind(entry_id.to_string())
        .execute(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    pub async fn history(
        conn: &mut SqliteConnection,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletLedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerRow>(&format!(
            r#"
            SELECT {} FROM wallet_ledger
            WHERE user_id = ?
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
            LEDGER_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }
}
