use super::ledger::CreditLedger;
use super::pricing::{PriceBoard, PricingEngine};
use crate::domain::account::Identity;
use crate::domain::catalog::{Catalog, CreativeBundle};
use crate::domain::generation::{
    Generation, GenerationId, GenerationRequest, GenerationStatus, NewGeneration,
};
use crate::domain::ports::{GenerationStoreRef, UpstreamGeneratorRef};
use crate::error::{BillingError, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Steps of a single generation purchase, reported in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseStage {
    Requested,
    CreditCheck,
    Rejected,
    Processing,
    Debit,
    Completed,
    Failed,
}

impl fmt::Display for PurchaseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PurchaseStage::Requested => "requested",
            PurchaseStage::CreditCheck => "credit_check",
            PurchaseStage::Rejected => "rejected",
            PurchaseStage::Processing => "processing",
            PurchaseStage::Debit => "debit",
            PurchaseStage::Completed => "completed",
            PurchaseStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseReceipt {
    pub generation: Generation,
    pub credits_spent: u64,
    pub balance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleReceipt {
    pub bundle: String,
    pub credits_spent: u64,
    /// One pending generation per bundled unit.
    pub generations: Vec<GenerationId>,
    pub balance: u64,
}

/// Sells generations and bundles against the credit ledger.
#[derive(Clone)]
pub struct PurchaseService {
    pricing: PricingEngine,
    board: PriceBoard,
    ledger: CreditLedger,
    generations: GenerationStoreRef,
    upstream: UpstreamGeneratorRef,
    catalog: Arc<Catalog>,
    upstream_timeout: Duration,
}

impl PurchaseService {
    pub fn new(
        pricing: PricingEngine,
        board: PriceBoard,
        ledger: CreditLedger,
        generations: GenerationStoreRef,
        upstream: UpstreamGeneratorRef,
        catalog: Arc<Catalog>,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            pricing,
            board,
            ledger,
            generations,
            upstream,
            catalog,
            upstream_timeout,
        }
    }

    /// Runs one generation and charges for it.
    ///
    /// Credits are only debited once the upstream call succeeded. A failed or
    /// timed-out call marks the generation failed and charges nothing.
    pub async fn purchase_generation(
        &self,
        identity: &dyn Identity,
        request: GenerationRequest,
    ) -> Result<PurchaseReceipt> {
        let account = identity.account_id();
        let capability = request.capability;
        debug!(%account, %capability, stage = %PurchaseStage::Requested);

        if capability.requires_subscription() && !identity.has_premium_access() {
            return Err(BillingError::SubscriptionRequired(capability.to_string()));
        }

        let quote = self.pricing.quote(capability).await?;
        if !quote.is_priced() {
            return Err(BillingError::not_found("price", capability));
        }
        let price = quote.final_price;

        debug!(%account, %capability, price, stage = %PurchaseStage::CreditCheck);
        let available = self.ledger.balance(account).await?;
        if available < price {
            debug!(%account, %capability, stage = %PurchaseStage::Rejected);
            return Err(BillingError::InsufficientBalance {
                required: price,
                available,
            });
        }

        let mut generation = self
            .generations
            .insert(NewGeneration {
                account,
                capability,
                cost: price,
                prompt: request.prompt.clone(),
                parameters: request.parameters.clone(),
                status: GenerationStatus::Processing,
            })
            .await?;
        debug!(%account, generation = %generation.id, stage = %PurchaseStage::Processing);

        let outcome = tokio::time::timeout(self.upstream_timeout, self.upstream.generate(&request))
            .await
            .unwrap_or_else(|_| {
                Err(BillingError::UpstreamFailure(format!(
                    "no response within {} ms",
                    self.upstream_timeout.as_millis()
                )))
            });
        let output = match outcome {
            Ok(output) => output,
            Err(err) => {
                self.fail(generation).await;
                return Err(match err {
                    err @ BillingError::UpstreamFailure(_) => err,
                    other => BillingError::UpstreamFailure(other.to_string()),
                });
            }
        };

        debug!(%account, generation = %generation.id, stage = %PurchaseStage::Debit);
        let reason = format!("{capability} generation #{}", generation.id);
        let (charged, _) = match self.ledger.debit(account, price, &reason).await {
            Ok(posted) => posted,
            Err(err) => {
                // The balance was spent by a concurrent purchase.
                self.fail(generation).await;
                return Err(err);
            }
        };

        generation.complete(output);
        if let Err(err) = self.generations.store(generation.clone()).await {
            // Credits are already posted, so the receipt still goes out.
            warn!(
                %account,
                generation = %generation.id,
                error = %err,
                "completed generation could not be stored"
            );
        }
        debug!(%account, generation = %generation.id, stage = %PurchaseStage::Completed);
        info!(
            %account,
            %capability,
            generation = %generation.id,
            credits = price,
            balance = charged.balance,
            "generation purchased"
        );

        Ok(PurchaseReceipt {
            generation,
            credits_spent: price,
            balance: charged.balance,
        })
    }

    /// Marks a generation failed. A store error is logged so the caller
    /// still sees the error that caused the failure.
    async fn fail(&self, mut generation: Generation) {
        generation.fail();
        warn!(
            account = %generation.account,
            capability = %generation.capability,
            generation = %generation.id,
            stage = %PurchaseStage::Failed,
            "generation failed, no credits charged"
        );
        let id = generation.id;
        if let Err(err) = self.generations.store(generation).await {
            warn!(generation = %id, error = %err, "failed generation could not be stored");
        }
    }

    async fn fail_all(&self, generations: Vec<Generation>) {
        for generation in generations {
            self.fail(generation).await;
        }
    }

    /// Current discounted price of an active bundle.
    pub async fn bundle_price(&self, bundle_id: u32) -> Result<u64> {
        let bundle = self.bundle(bundle_id)?;
        self.price_bundle(bundle).await
    }

    async fn price_bundle(&self, bundle: &CreativeBundle) -> Result<u64> {
        let snapshot = self.board.snapshot().await?;
        let mut base: u64 = 0;
        for item in &bundle.items {
            let price = match snapshot.get(&item.capability) {
                Some(quote) if quote.is_priced() => quote.final_price,
                _ => return Err(BillingError::not_found("price", item.capability)),
            };
            base = price
                .checked_mul(u64::from(item.quantity))
                .and_then(|line| base.checked_add(line))
                .ok_or_else(|| {
                    BillingError::InvalidConfigValue(format!("price of bundle '{}' overflows", bundle.name))
                })?;
        }
        Ok(bundle.discounted(base))
    }

    fn bundle(&self, bundle_id: u32) -> Result<&CreativeBundle> {
        self.catalog
            .bundle(bundle_id)
            .ok_or_else(|| BillingError::not_found("bundle", bundle_id))
    }

    /// Charges the bundle price once and opens a pending generation for every
    /// unit it contains.
    pub async fn purchase_bundle(
        &self,
        identity: &dyn Identity,
        bundle_id: u32,
    ) -> Result<BundleReceipt> {
        let account = identity.account_id();
        let bundle = self.bundle(bundle_id)?;
        if bundle.requires_subscription && !identity.has_premium_access() {
            return Err(BillingError::SubscriptionRequired(bundle.name.clone()));
        }

        let price = self.price_bundle(bundle).await?;
        let available = self.ledger.balance(account).await?;
        if available < price {
            return Err(BillingError::InsufficientBalance {
                required: price,
                available,
            });
        }

        // Records first: a charge is only taken once every unit is stored.
        let mut opened = Vec::with_capacity(bundle.items.len());
        for item in &bundle.items {
            for _ in 0..item.quantity {
                let inserted = self
                    .generations
                    .insert(NewGeneration {
                        account,
                        capability: item.capability,
                        cost: 0,
                        prompt: String::new(),
                        parameters: serde_json::Value::Null,
                        status: GenerationStatus::Pending,
                    })
                    .await;
                match inserted {
                    Ok(generation) => opened.push(generation),
                    Err(err) => {
                        self.fail_all(opened).await;
                        return Err(err);
                    }
                }
            }
        }

        let balance = if price > 0 {
            let reason = format!("bundle: {}", bundle.name);
            match self.ledger.debit(account, price, &reason).await {
                Ok((charged, _)) => charged.balance,
                Err(err) => {
                    self.fail_all(opened).await;
                    return Err(err);
                }
            }
        } else {
            available
        };
        let generations: Vec<GenerationId> = opened.iter().map(|g| g.id).collect();

        info!(
            %account,
            bundle = %bundle.name,
            credits = price,
            units = generations.len(),
            balance,
            "bundle purchased"
        );
        Ok(BundleReceipt {
            bundle: bundle.name.clone(),
            credits_spent: price,
            generations,
            balance,
        })
    }

    /// A generation owned by the caller.
    pub async fn generation(&self, identity: &dyn Identity, id: GenerationId) -> Result<Generation> {
        match self.generations.get(id).await? {
            Some(generation) if generation.account == identity.account_id() => Ok(generation),
            _ => Err(BillingError::not_found("generation", id)),
        }
    }

    /// The caller's generations, newest first.
    pub async fn generations(
        &self,
        identity: &dyn Identity,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Generation>> {
        Ok(self
            .generations
            .for_account(identity.account_id())
            .await?
            .into_iter()
            .skip(skip)
            .take(limit)
            .collect())
    }
}
