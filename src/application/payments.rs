use super::ledger::CreditLedger;
use crate::domain::account::Identity;
use crate::domain::catalog::{Catalog, SubscriptionTier};
use crate::domain::ledger::{EntryKind, LedgerEntry};
use crate::domain::payment::{
    PaymentEvent, PaymentIntent, PaymentMetadata, PaymentPurpose, PaymentStatus,
};
use crate::domain::ports::PaymentGatewayRef;
use crate::error::{BillingError, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a settled payment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settlement {
    pub entry: LedgerEntry,
    /// Tier bought by a subscription payment. Accounts do not store tiers, so
    /// whoever backs `Identity` applies it to the payer's premium access.
    pub tier: Option<SubscriptionTier>,
}

/// Checkout of credit packages and subscriptions, and settlement of the
/// gateway's payment notifications.
#[derive(Clone)]
pub struct PaymentService {
    gateway: PaymentGatewayRef,
    ledger: CreditLedger,
    catalog: Arc<Catalog>,
}

impl PaymentService {
    pub fn new(gateway: PaymentGatewayRef, ledger: CreditLedger, catalog: Arc<Catalog>) -> Self {
        Self {
            gateway,
            ledger,
            catalog,
        }
    }

    pub async fn checkout_package(
        &self,
        identity: &dyn Identity,
        package_id: u32,
    ) -> Result<PaymentIntent> {
        let package = self
            .catalog
            .package(package_id)
            .ok_or_else(|| BillingError::not_found("credit package", package_id))?;
        let metadata = PaymentMetadata {
            account: identity.account_id(),
            purpose: PaymentPurpose::Credits { package_id },
        };
        let description = format!("{} credits: {}", package.total_credits(), package.name);
        self.gateway
            .create_payment(package.price, &description, metadata)
            .await
    }

    pub async fn checkout_subscription(
        &self,
        identity: &dyn Identity,
        tier: SubscriptionTier,
    ) -> Result<PaymentIntent> {
        if !tier.is_premium() {
            return Err(BillingError::InvalidParameter(format!(
                "the {tier} tier cannot be purchased"
            )));
        }
        let metadata = PaymentMetadata {
            account: identity.account_id(),
            purpose: PaymentPurpose::Subscription { tier },
        };
        let description = format!("{tier} subscription, one month");
        self.gateway
            .create_payment(tier.monthly_price(), &description, metadata)
            .await
    }

    /// Credits the account a succeeded payment was made for.
    ///
    /// Events for other statuses are ignored. A payment id is settled at most
    /// once; replays return the entry of the first settlement. A subscription
    /// payment reports its tier in the settlement and the caller activates it.
    pub async fn settle(&self, event: PaymentEvent) -> Result<Option<Settlement>> {
        if event.status != PaymentStatus::Succeeded {
            debug!(payment_id = %event.payment_id, status = ?event.status, "payment event ignored");
            return Ok(None);
        }
        let tier = event.metadata.as_ref().and_then(|metadata| match metadata.purpose {
            PaymentPurpose::Subscription { tier } => Some(tier),
            PaymentPurpose::Credits { .. } => None,
        });
        if let Some(existing) = self.ledger.find_by_ref(&event.payment_id).await? {
            debug!(payment_id = %event.payment_id, "payment already settled");
            return Ok(Some(Settlement { entry: existing, tier }));
        }

        let metadata = event.metadata.ok_or_else(|| {
            BillingError::InvalidParameter(format!(
                "payment {} carries no metadata",
                event.payment_id
            ))
        })?;
        let (credits, kind, reason) = match metadata.purpose {
            PaymentPurpose::Credits { package_id } => {
                let package = self
                    .catalog
                    .package(package_id)
                    .ok_or_else(|| BillingError::not_found("credit package", package_id))?;
                (
                    package.total_credits(),
                    EntryKind::CreditPurchase,
                    format!("credit package: {}", package.name),
                )
            }
            PaymentPurpose::Subscription { tier } => (
                tier.included_credits(),
                EntryKind::Subscription,
                format!("{tier} subscription"),
            ),
        };

        let credited = self
            .ledger
            .credit(
                metadata.account,
                credits,
                kind,
                &reason,
                event.amount,
                Some(event.payment_id.clone()),
            )
            .await;
        match credited {
            Ok((_, entry)) => {
                info!(payment_id = %event.payment_id, account = %metadata.account, credits, "payment settled");
                Ok(Some(Settlement { entry, tier }))
            }
            // A concurrent delivery of the same event won.
            Err(BillingError::DuplicateReference(_)) => Ok(self
                .ledger
                .find_by_ref(&event.payment_id)
                .await?
                .map(|entry| Settlement { entry, tier })),
            Err(err) => Err(err),
        }
    }
}
