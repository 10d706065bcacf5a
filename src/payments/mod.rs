use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::error::Result;

pub mod stripe_gateway;

pub use stripe_gateway::StripeGateway;

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutLink {
    pub external_order_id: String,
    pub checkout_url: String,
}

#[derive(Debug, Clone)]
pub struct BuyerInfo {
    pub user_id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Clone)]
pub struct GatewayPaymentStatus {
    pub succeeded: bool,
    pub amount: i64,
    pub status: String,
}

/// Outbound interface to the payment provider. The engine only ever asks
/// for a checkout link before a top-up and a status when reconciling by
/// hand; everything else arrives through the webhook.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &str;
    async fn create_checkout_link(&self, amount: i64, buyer: &BuyerInfo) -> Result<CheckoutLink>;
    async fn get_payment_status(&self, external_order_id: &str) -> Result<GatewayPaymentStatus>;
}

/// In-memory gateway for tests: hands out predictable order ids and
/// reports every payment as settled.
#[cfg(any(test, feature = "test-utils"))]
pub struct FakePaymentGateway {
    counter: std::sync::atomic::AtomicU64,
}

#[cfg(any(test, feature = "test-utils"))]
impl FakePaymentGateway {
    pub fn new() -> Self {
        Self {
            counter: std::sync::atomic::AtomicU64::new(7_000_000),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for FakePaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_checkout_link(&self, _amount: i64, buyer: &BuyerInfo) -> Result<CheckoutLink> {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(CheckoutLink {
            external_order_id: format!("FAKE-{}", n),
            checkout_url: format!("https://pay.example/checkout/{}?u={}", n, buyer.user_id),
        })
    }

    async fn get_payment_status(&self, _external_order_id: &str) -> Result<GatewayPaymentStatus> {
        Ok(GatewayPaymentStatus {
            succeeded: true,
            amount: 0,
            status: "paid".to_string(),
        })
    }
}
