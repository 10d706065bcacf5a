use async_trait::async_trait;

use crate::{
    config::WebhookSinkConfig,
    error::{AppError, Result},
    notifications::{NotificationSink, PaymentEvent},
};

/// POSTs each payment event as JSON to a configured endpoint, e.g. the
/// notification service that fans out to email/push.
pub struct WebhookSink {
    client: reqwest::Client,
    config: WebhookSinkConfig,
}

impl WebhookSink {
    pub fn new(config: Option<WebhookSinkConfig>) -> Option<Self> {
        config.and_then(|cfg| {
            if cfg.enabled {
                Some(Self {
                    client: reqwest::Client::new(),
                    config: cfg,
                })
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        "Webhook"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn health_check(&self) -> Result<()> {
        if self.config.url.is_empty() {
            return Err(AppError::External(
                "Notification webhook URL not configured".to_string(),
            ));
        }
        Ok(())
    }

    async fn notify(&self, event: &PaymentEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.config.url)
            .json(event)
            .send()
            .await
            .map_err(|e| AppError::External(format!("Notification webhook error: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::External(format!(
                "Notification webhook returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
