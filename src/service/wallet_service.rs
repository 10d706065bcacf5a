use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{LedgerEntryStatus, LedgerEntryType, User, WalletAccount, WalletLedgerEntry},
    error::{AppError, Result},
    payments::{BuyerInfo, PaymentGateway},
    repository::WalletStore,
};

/// The wallet ledger: the only component allowed to move a balance.
///
/// The conn-taking associated functions are the in-transaction primitives;
/// escrow and booking code compose them inside their own units of work.
/// The instance methods own pool-level operations for the API surface.
pub struct WalletService {
    pool: SqlitePool,
    gateway: Option<Arc<dyn PaymentGateway>>,
    min_top_up: i64,
}

#[derive(Debug, Serialize)]
pub struct TopUpIntent {
    pub external_order_id: String,
    pub checkout_url: String,
    pub entry: WalletLedgerEntry,
}

impl WalletService {
    pub fn new(
        pool: SqlitePool,
        gateway: Option<Arc<dyn PaymentGateway>>,
        min_top_up: i64,
    ) -> Self {
        Self {
            pool,
            gateway,
            min_top_up,
        }
    }

    /// Singleton entry types derive their code from the reference so the
    /// unique index turns a replayed mutation into a constraint hit instead
    /// of a second application.
    fn transaction_code(entry_type: LedgerEntryType, reference_id: Option<&str>) -> String {
        match reference_id {
            Some(reference) if entry_type.singleton_per_reference() => {
                format!("{}:{}", entry_type.code_prefix(), reference)
            }
            _ => format!("{}:{}", entry_type.code_prefix(), Uuid::new_v4()),
        }
    }

    /// Atomically decrements the balance and appends the Completed entry.
    /// Rejects with `InsufficientFunds` when the guarded decrement matches
    /// no row; nothing is written in that case.
    pub async fn debit(
        conn: &mut SqliteConnection,
        user_id: Uuid,
        amount: i64,
        entry_type: LedgerEntryType,
        description: String,
        reference_id: Option<String>,
    ) -> Result<WalletLedgerEntry> {
        if amount <= 0 {
            return Err(AppError::BadRequest(
                "Debit amount must be positive".to_string(),
            ));
        }

        if let Some(ref reference) = reference_id {
            if entry_type.singleton_per_reference() {
                if let Some(existing) =
                    WalletStore::find_completed_by_reference(conn, reference, entry_type).await?
                {
                    tracing::info!(
                        "ledger.debit: reference {} already applied, returning existing entry",
                        reference
                    );
                    return Ok(existing);
                }
            }
        }

        if !WalletStore::try_debit(conn, user_id, amount).await? {
            let balance = WalletStore::balance_of(conn, user_id).await?;
            return Err(AppError::InsufficientFunds(format!(
                "Balance {} does not cover {}",
                balance, amount
            )));
        }

        let balance_after = WalletStore::balance_of(conn, user_id).await?;
        let entry = WalletLedgerEntry {
            id: Uuid::new_v4(),
            user_id,
            transaction_code: Self::transaction_code(entry_type, reference_id.as_deref()),
            entry_type,
            amount: -amount,
            description,
            reference_id,
            status: LedgerEntryStatus::Completed,
            balance_after: Some(balance_after),
            created_at: Utc::now(),
        };
        WalletStore::insert_entry(conn, &entry).await?;

        Ok(entry)
    }

    /// Increments the balance (creating the account on first use) and
    /// appends the Completed entry. Credits have no upper bound.
    pub async fn credit(
        conn: &mut SqliteConnection,
        user_id: Uuid,
        amount: i64,
        entry_type: LedgerEntryType,
        description: String,
        reference_id: Option<String>,
    ) -> Result<WalletLedgerEntry> {
        if amount <= 0 {
            return Err(AppError::BadRequest(
                "Credit amount must be positive".to_string(),
            ));
        }

        if let Some(ref reference) = reference_id {
            if entry_type.singleton_per_reference() {
                if let Some(existing) =
                    WalletStore::find_completed_by_reference(conn, reference, entry_type).await?
                {
                    tracing::info!(
                        "ledger.credit: reference {} already applied, returning existing entry",
                        reference
                    );
                    return Ok(existing);
                }
            }
        }

        WalletStore::credit(conn, user_id, amount).await?;
        let balance_after = WalletStore::balance_of(conn, user_id).await?;
        let entry = WalletLedgerEntry {
            id: Uuid::new_v4(),
            user_id,
            transaction_code: Self::transaction_code(entry_type, reference_id.as_deref()),
            entry_type,
            amount,
            description,
            reference_id,
            status: LedgerEntryStatus::Completed,
            balance_after: Some(balance_after),
            created_at: Utc::now(),
        };
        WalletStore::insert_entry(conn, &entry).await?;

        Ok(entry)
    }

    /// Records an outstanding external payment without touching the balance.
    pub async fn record_pending_top_up(
        conn: &mut SqliteConnection,
        user_id: Uuid,
        amount: i64,
        external_order_id: String,
        description: String,
    ) -> Result<WalletLedgerEntry> {
        if amount <= 0 {
            return Err(AppError::BadRequest(
                "Top-up amount must be positive".to_string(),
            ));
        }

        if let Some(existing) =
            WalletStore::find_top_up_by_reference(conn, &external_order_id).await?
        {
            tracing::info!(
                "ledger.top_up: order {} already recorded, returning existing entry",
                external_order_id
            );
            return Ok(existing);
        }

        let entry = WalletLedgerEntry {
            id: Uuid::new_v4(),
            user_id,
            transaction_code: Self::transaction_code(
                LedgerEntryType::TopUpPending,
                Some(&external_order_id),
            ),
            entry_type: LedgerEntryType::TopUpPending,
            amount,
            description,
            reference_id: Some(external_order_id),
            status: LedgerEntryStatus::Pending,
            balance_after: None,
            created_at: Utc::now(),
        };
        WalletStore::insert_entry(conn, &entry).await?;

        Ok(entry)
    }

    /// Settles the pending top-up for an external order: credits the
    /// balance and flips the entry to a Completed TopUp. A replay against
    /// an already-settled order returns the existing entry untouched;
    /// an unknown order returns `Ok(None)` and the caller decides how to
    /// treat the orphan.
    pub async fn complete_pending_top_up(
        conn: &mut SqliteConnection,
        external_order_id: &str,
    ) -> Result<Option<WalletLedgerEntry>> {
        let Some(mut entry) = WalletStore::find_top_up_by_reference(conn, external_order_id).await?
        else {
            return Ok(None);
        };

        if entry.status == LedgerEntryStatus::Completed {
            tracing::info!(
                "ledger.top_up: order {} already completed, ignoring replay",
                external_order_id
            );
            return Ok(Some(entry));
        }

        WalletStore::credit(conn, entry.user_id, entry.amount).await?;
        let balance_after = WalletStore::balance_of(conn, entry.user_id).await?;
        WalletStore::complete_top_up_entry(conn, entry.id, balance_after).await?;

        entry.entry_type = LedgerEntryType::TopUp;
        entry.status = LedgerEntryStatus::Completed;
        entry.balance_after = Some(balance_after);
        Ok(Some(entry))
    }

    /// Marks the pending top-up Failed, appending the gateway's reason to
    /// the description. No balance change. Completed entries are left
    /// alone: a failure notice arriving after settlement is a replay.
    pub async fn fail_pending_top_up(
        conn: &mut SqliteConnection,
        external_order_id: &str,
        reason: &str,
    ) -> Result<Option<WalletLedgerEntry>> {
        let Some(mut entry) = WalletStore::find_top_up_by_reference(conn, external_order_id).await?
        else {
            return Ok(None);
        };

        if entry.status != LedgerEntryStatus::Pending {
            return Ok(Some(entry));
        }

        let description = format!("{} ({})", entry.description, reason);
        WalletStore::fail_top_up_entry(conn, entry.id, &description).await?;

        entry.status = LedgerEntryStatus::Failed;
        entry.description = description;
        Ok(Some(entry))
    }

    pub async fn account(&self, user_id: Uuid) -> Result<WalletAccount> {
        let mut conn = self.pool.acquire().await?;
        let account = WalletStore::find_account(&mut conn, user_id).await?;
        Ok(account.unwrap_or(WalletAccount {
            user_id,
            balance: 0,
            updated_at: Utc::now(),
        }))
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WalletLedgerEntry>> {
        let mut conn = self.pool.acquire().await?;
        WalletStore::history(&mut conn, user_id, limit, offset).await
    }

    /// Creates the external checkout first (no transaction or lock is held
    /// across the gateway call), then records the pending entry.
    pub async fn initiate_top_up(&self, user: &User, amount: i64) -> Result<TopUpIntent> {
        if amount < self.min_top_up {
            return Err(AppError::Validation(format!(
                "Minimum top-up is {}",
                self.min_top_up
            )));
        }

        let gateway = self
            .gateway
            .as_ref()
            .ok_or_else(|| AppError::Payment("Payment processing is not enabled".to_string()))?;

        let buyer = BuyerInfo {
            user_id: user.id,
            full_name: user.full_name.clone(),
        };
        let link = gateway.create_checkout_link(amount, &buyer).await?;

        let mut tx = self.pool.begin().await?;
        let entry = Self::record_pending_top_up(
            &mut tx,
            user.id,
            amount,
            link.external_order_id.clone(),
            format!("Wallet top-up via {}", gateway.name()),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            "wallet.top_up: user {} initiated {} (order {})",
            user.id,
            amount,
            link.external_order_id
        );

        Ok(TopUpIntent {
            external_order_id: link.external_order_id,
            checkout_url: link.checkout_url,
            entry,
        })
    }
}
