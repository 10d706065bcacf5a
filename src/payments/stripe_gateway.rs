use std::str::FromStr;

use async_trait::async_trait;
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus,
    Client, CreateCheckoutSession, CreateCheckoutSessionLineItems, Currency, EventObject,
    EventType, Webhook, WebhookError,
};

use crate::{
    error::{AppError, Result},
    payments::{BuyerInfo, CheckoutLink, GatewayPaymentStatus, PaymentGateway},
    service::PaymentNotification,
};

pub struct StripeGateway {
    client: Client,
    currency: Currency,
    base_url: String,
}

impl StripeGateway {
    pub fn new(api_key: String, currency: &str, base_url: String) -> Result<Self> {
        let currency = Currency::from_str(currency)
            .map_err(|e| AppError::Payment(format!("Invalid currency: {}", e)))?;
        Ok(Self {
            client: Client::new(api_key),
            currency,
            base_url,
        })
    }

    /// Turns a raw Stripe webhook payload into the normalized notification
    /// the reconciler consumes. Returns `None` for event types the engine
    /// does not care about.
    pub fn parse_webhook(
        payload: &str,
        stripe_signature: &str,
        webhook_secret: &str,
    ) -> Result<Option<PaymentNotification>> {
        let event = Webhook::construct_event(payload, stripe_signature, webhook_secret)
            .map_err(|e| match e {
                WebhookError::BadSignature => {
                    AppError::BadRequest("Invalid signature".to_string())
                }
                _ => AppError::External(format!("Webhook error: {}", e)),
            })?;

        let notification = match event.type_ {
            EventType::CheckoutSessionCompleted => {
                if let EventObject::CheckoutSession(session) = event.data.object {
                    Some(PaymentNotification {
                        external_order_id: session.id.to_string(),
                        amount: session.amount_total.unwrap_or(0),
                        succeeded: true,
                        code: None,
                        description: Some("checkout session completed".to_string()),
                        reference: session.client_reference_id,
                    })
                } else {
                    None
                }
            }
            EventType::CheckoutSessionExpired => {
                if let EventObject::CheckoutSession(session) = event.data.object {
                    Some(PaymentNotification {
                        external_order_id: session.id.to_string(),
                        amount: session.amount_total.unwrap_or(0),
                        succeeded: false,
                        code: None,
                        description: Some("checkout session expired".to_string()),
                        reference: session.client_reference_id,
                    })
                } else {
                    None
                }
            }
            EventType::PaymentIntentPaymentFailed => {
                if let EventObject::PaymentIntent(intent) = event.data.object {
                    Some(PaymentNotification {
                        external_order_id: intent.id.to_string(),
                        amount: intent.amount,
                        succeeded: false,
                        code: None,
                        description: Some("payment failed".to_string()),
                        reference: None,
                    })
                } else {
                    None
                }
            }
            _ => {
                tracing::debug!("Unhandled webhook event type: {:?}", event.type_);
                None
            }
        };

        Ok(notification)
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn name(&self) -> &str {
        "stripe"
    }

    async fn create_checkout_link(&self, amount: i64, buyer: &BuyerInfo) -> Result<CheckoutLink> {
        let success_url = format!("{}/wallet?topup=success", self.base_url);
        let cancel_url = format!("{}/wallet?topup=cancelled", self.base_url);

        let mut params = CreateCheckoutSession::new();
        params.mode = Some(CheckoutSessionMode::Payment);
        params.success_url = Some(&success_url);
        params.cancel_url = Some(&cancel_url);

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                currency: self.currency,
                unit_amount: Some(amount),
                product_data: Some(
                    stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                        name: "Wallet top-up".to_string(),
                        description: Some(format!("Add {} to your wallet", amount)),
                        ..Default::default()
                    },
                ),
                ..Default::default()
            }),
            quantity: Some(1),
            ..Default::default()
        }]);

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("user_id".to_string(), buyer.user_id.to_string());
        metadata.insert("buyer_name".to_string(), buyer.full_name.clone());
        params.metadata = Some(metadata);
        let reference = buyer.user_id.to_string();
        params.client_reference_id = Some(&reference);

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        let checkout_url = session
            .url
            .ok_or_else(|| AppError::External("No checkout URL returned".to_string()))?;

        Ok(CheckoutLink {
            external_order_id: session.id.to_string(),
            checkout_url,
        })
    }

    async fn get_payment_status(&self, external_order_id: &str) -> Result<GatewayPaymentStatus> {
        let session_id = CheckoutSessionId::from_str(external_order_id)
            .map_err(|e| AppError::BadRequest(format!("Invalid checkout session id: {}", e)))?;

        let session = CheckoutSession::retrieve(&self.client, &session_id, &[])
            .await
            .map_err(|e| AppError::External(format!("Stripe error: {}", e)))?;

        Ok(GatewayPaymentStatus {
            succeeded: session.payment_status == CheckoutSessionPaymentStatus::Paid,
            amount: session.amount_total.unwrap_or(0),
            status: format!("{:?}", session.payment_status),
        })
    }
}
