use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{
    config::PaymentConfig,
    domain::LedgerEntryStatus,
    error::Result,
    notifications::{NotificationManager, PaymentEvent},
    repository::WalletStore,
    service::wallet_service::WalletService,
};

/// Normalized inbound payment notification, as produced by the gateway
/// adapter. The reconciler never sees raw gateway payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub external_order_id: String,
    pub amount: i64,
    pub succeeded: bool,
    pub code: Option<String>,
    pub description: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Credited,
    MarkedFailed,
    AlreadyProcessed,
    SyntheticIgnored,
    Orphaned,
}

/// Maps gateway notifications onto pending top-up entries. The contract
/// with the gateway is "never signal failure for a structurally valid
/// notification": a failure response only triggers retries that cannot
/// resolve anything, so duplicates, test pings and orphans all acknowledge
/// as success.
pub struct ReconcileService {
    pool: SqlitePool,
    config: PaymentConfig,
    notifier: Arc<NotificationManager>,
}

impl ReconcileService {
    pub fn new(pool: SqlitePool, config: PaymentConfig, notifier: Arc<NotificationManager>) -> Self {
        Self {
            pool,
            config,
            notifier,
        }
    }

    pub async fn reconcile(&self, notification: PaymentNotification) -> Result<ReconcileOutcome> {
        if is_synthetic(&self.config, &notification) {
            tracing::info!(
                "reconcile: ignoring synthetic notification for order {}",
                notification.external_order_id
            );
            return Ok(ReconcileOutcome::SyntheticIgnored);
        }

        let mut tx = self.pool.begin().await?;

        let mut entry =
            WalletStore::find_top_up_by_reference(&mut tx, &notification.external_order_id).await?;
        if entry.is_none() {
            if let Some(ref reference) = notification.reference {
                entry = WalletStore::find_top_up_by_reference(&mut tx, reference).await?;
            }
        }

        let Some(entry) = entry else {
            // Real-looking money event with nothing to attach it to.
            // Manual-review case, never an auto-credit: acknowledge the
            // gateway and leave a trail.
            tracing::warn!(
                "reconcile: orphaned payment notification, order {} amount {} succeeded {}",
                notification.external_order_id,
                notification.amount,
                notification.succeeded
            );
            return Ok(ReconcileOutcome::Orphaned);
        };

        if entry.status == LedgerEntryStatus::Completed {
            tracing::info!(
                "reconcile: order {} already settled, ignoring replay",
                notification.external_order_id
            );
            return Ok(ReconcileOutcome::AlreadyProcessed);
        }

        let reference = entry
            .reference_id
            .clone()
            .unwrap_or_else(|| notification.external_order_id.clone());

        if notification.succeeded {
            let completed = WalletService::complete_pending_top_up(&mut tx, &reference).await?;
            tx.commit().await?;

            if let Some(completed) = completed {
                tracing::info!(
                    "reconcile: credited {} to {} for order {}",
                    completed.amount,
                    completed.user_id,
                    reference
                );
                self.notifier
                    .dispatch(PaymentEvent::TopUpCompleted {
                        user_id: completed.user_id,
                        amount: completed.amount,
                    })
                    .await;
            }
            Ok(ReconcileOutcome::Credited)
        } else {
            let failure = notification
                .description
                .clone()
                .unwrap_or_else(|| "payment failed".to_string());
            let failed = WalletService::fail_pending_top_up(&mut tx, &reference, &failure).await?;
            tx.commit().await?;

            if let Some(failed) = failed {
                tracing::info!(
                    "reconcile: order {} marked failed: {}",
                    reference,
                    failure
                );
                self.notifier
                    .dispatch(PaymentEvent::TopUpFailed {
                        user_id: failed.user_id,
                        amount: failed.amount,
                    })
                    .await;
            }
            Ok(ReconcileOutcome::MarkedFailed)
        }
    }
}

/// Gateways send connectivity probes and sandbox payloads through the
/// production webhook. Known sentinel order codes, sub-threshold amounts
/// and tiny numeric order ids never correspond to a real checkout here.
fn is_synthetic(config: &PaymentConfig, notification: &PaymentNotification) -> bool {
    let order = notification.external_order_id.as_str();
    if config.synthetic_order_codes.iter().any(|c| c == order) {
        return true;
    }
    if let Some(ref code) = notification.code {
        if config.synthetic_order_codes.iter().any(|c| c == code) {
            return true;
        }
    }
    if notification.amount < config.synthetic_amount_floor {
        return true;
    }
    if let Ok(numeric) = order.parse::<u64>() {
        if numeric < config.synthetic_numeric_floor {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(order: &str, amount: i64) -> PaymentNotification {
        PaymentNotification {
            external_order_id: order.to_string(),
            amount,
            succeeded: true,
            code: None,
            description: None,
            reference: None,
        }
    }

    #[test]
    fn sentinel_order_codes_are_synthetic() {
        let config = PaymentConfig::default();
        assert!(is_synthetic(&config, &notification("123", 50_000)));
    }

    #[test]
    fn sub_threshold_amounts_are_synthetic() {
        let config = PaymentConfig::default();
        assert!(is_synthetic(&config, &notification("ord_8f3k2", 500)));
    }

    #[test]
    fn small_numeric_order_ids_are_synthetic() {
        let config = PaymentConfig::default();
        assert!(is_synthetic(&config, &notification("999", 50_000)));
    }

    #[test]
    fn real_orders_pass_the_filter() {
        let config = PaymentConfig::default();
        assert!(!is_synthetic(&config, &notification("ord_8f3k2", 50_000)));
        assert!(!is_synthetic(&config, &notification("100045", 50_000)));
    }
}
