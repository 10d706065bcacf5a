use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

pub mod webhook_sink;

/// Money events other systems care about. Delivery is fire-and-forget: a
/// sink failure is logged and never propagates into the transaction that
/// produced the event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PaymentEvent {
    TopUpCompleted {
        user_id: Uuid,
        amount: i64,
    },
    TopUpFailed {
        user_id: Uuid,
        amount: i64,
    },
    BookingHeld {
        user_id: Uuid,
        booking_code: String,
        amount: i64,
    },
    EscrowReleased {
        user_id: Uuid,
        booking_code: String,
        amount: i64,
    },
    RefundIssued {
        user_id: Uuid,
        booking_code: String,
        amount: i64,
    },
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;
    fn is_enabled(&self) -> bool;
    async fn health_check(&self) -> Result<()>;
    async fn notify(&self, event: &PaymentEvent) -> Result<()>;
}

pub struct NotificationManager {
    sinks: RwLock<Vec<Arc<dyn NotificationSink>>>,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self {
            sinks: RwLock::new(Vec::new()),
        }
    }

    pub async fn register(&self, sink: Arc<dyn NotificationSink>) {
        if sink.is_enabled() {
            let mut sinks = self.sinks.write().await;
            tracing::info!("Registered notification sink: {}", sink.name());
            sinks.push(sink);
        }
    }

    pub async fn dispatch(&self, event: PaymentEvent) {
        let sinks = self.sinks.read().await;

        for sink in sinks.iter() {
            if !sink.is_enabled() {
                continue;
            }

            match sink.notify(&event).await {
                Ok(_) => {
                    tracing::debug!("Sink {} delivered event", sink.name());
                }
                Err(e) => {
                    tracing::error!("Sink {} failed to deliver event: {:?}", sink.name(), e);
                    // Keep going; one broken sink must not silence the rest
                }
            }
        }
    }

    pub async fn health_check_all(&self) -> Vec<(String, Result<()>)> {
        let sinks = self.sinks.read().await;
        let mut results = Vec::new();

        for sink in sinks.iter() {
            let name = sink.name().to_string();
            let result = sink.health_check().await;
            results.push((name, result));
        }

        results
    }
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}
