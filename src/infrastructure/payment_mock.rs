use crate::domain::payment::{PaymentIntent, PaymentMetadata, PaymentStatus};
use crate::domain::ports::PaymentGateway;
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::info;

const CHECKOUT_URL: &str = "https://mock-payments.example.com/checkout";

/// Gateway double that accepts every checkout and never contacts a provider.
pub struct MockPaymentGateway {
    latency: Duration,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_payment(
        &self,
        amount: Decimal,
        description: &str,
        metadata: PaymentMetadata,
    ) -> Result<PaymentIntent> {
        if amount <= Decimal::ZERO {
            return Err(BillingError::InvalidParameter(format!(
                "payment amount must be positive, got {amount}"
            )));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let id: u64 = rand::thread_rng().gen_range(0..=u64::MAX);
        let payment_id = format!("mock_{id:016x}");
        info!(%payment_id, %amount, description, "mock payment created");

        Ok(PaymentIntent {
            confirmation_url: format!("{CHECKOUT_URL}/{payment_id}"),
            payment_id,
            amount,
            status: PaymentStatus::Pending,
            metadata,
        })
    }
}
