use super::account::AccountId;
use super::catalog::SubscriptionTier;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// What a payment buys; echoed back by the gateway in its webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentPurpose {
    Credits { package_id: u32 },
    Subscription { tier: SubscriptionTier },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub account: AccountId,
    #[serde(flatten)]
    pub purpose: PaymentPurpose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Canceled,
}

/// A checkout created at the gateway, awaiting confirmation by the buyer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub payment_id: String,
    pub confirmation_url: String,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub metadata: PaymentMetadata,
}

/// Webhook notification about a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub metadata: Option<PaymentMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_wire_shape() {
        let metadata = PaymentMetadata {
            account: AccountId(3),
            purpose: PaymentPurpose::Subscription {
                tier: SubscriptionTier::Pro,
            },
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            value,
            json!({"account": 3, "type": "subscription", "tier": "pro"})
        );
    }
}
