use super::ConfigEvents;
use crate::domain::capability::Capability;
use crate::domain::engine::Status;
use crate::domain::fusion::{ChainId, FusionChain, NewFusionChain};
use crate::domain::ports::FusionChainStoreRef;
use crate::error::{BillingError, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Clone)]
pub struct FusionChainRegistry {
    store: FusionChainStoreRef,
    events: ConfigEvents,
    // Serialises the conflict check with the insert.
    create_lock: Arc<Mutex<()>>,
}

impl FusionChainRegistry {
    pub fn new(store: FusionChainStoreRef, events: ConfigEvents) -> Self {
        Self {
            store,
            events,
            create_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Registers a chain. At most one active chain may target a capability.
    pub async fn create_chain(&self, chain: NewFusionChain) -> Result<FusionChain> {
        chain.validate()?;

        let _guard = self.create_lock.lock().await;
        if self.store.all().await?.iter().any(|c| c.name == chain.name) {
            return Err(BillingError::DuplicateName {
                kind: "fusion chain",
                name: chain.name,
            });
        }
        if let Some(existing) = self.resolve_for_capability(chain.capability).await? {
            return Err(BillingError::ConflictingMapping {
                capability: chain.capability.to_string(),
                existing: existing.name,
            });
        }

        let chain = self.store.insert(chain).await?;
        self.events.notify();
        info!(
            id = %chain.id,
            name = %chain.name,
            capability = %chain.capability,
            steps = chain.steps.len(),
            total_cost_usd = %chain.total_cost_usd,
            "fusion chain created"
        );
        Ok(chain)
    }

    /// Retires the chain. Retiring a retired chain is a no-op.
    pub async fn deactivate_chain(&self, id: ChainId) -> Result<FusionChain> {
        let mut chain = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| BillingError::not_found("fusion chain", id))?;
        if chain.is_active() {
            chain.status = Status::Retired;
            chain.updated_at = Utc::now();
            self.store.store(chain.clone()).await?;
            self.events.notify();
            info!(id = %chain.id, name = %chain.name, "fusion chain retired");
        }
        Ok(chain)
    }

    pub async fn resolve_for_capability(
        &self,
        capability: Capability,
    ) -> Result<Option<FusionChain>> {
        Ok(self
            .store
            .all()
            .await?
            .into_iter()
            .find(|chain| chain.serves(capability)))
    }

    pub async fn list(&self) -> Result<Vec<FusionChain>> {
        self.store.all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fusion::FusionStep;
    use crate::infrastructure::in_memory::InMemoryFusionChainStore;
    use rust_decimal_macros::dec;

    fn registry() -> FusionChainRegistry {
        FusionChainRegistry::new(Arc::new(InMemoryFusionChainStore::new()), ConfigEvents::new())
    }

    fn branded_set(name: &str) -> NewFusionChain {
        NewFusionChain {
            name: name.to_string(),
            description: None,
            capability: Capability::BrandedSet,
            steps: vec![
                FusionStep {
                    engine_name: "Style Consistency Check".into(),
                    order: 3,
                    role: "consistency".into(),
                },
                FusionStep {
                    engine_name: "Recraft.ai".into(),
                    order: 1,
                    role: "vector base".into(),
                },
            ],
            total_cost_usd: dec!(0.40),
            markup_percentage: dec!(400),
        }
    }

    #[tokio::test]
    async fn test_create_sorts_steps() {
        let registry = registry();
        let chain = registry.create_chain(branded_set("Branded Set")).await.unwrap();
        let orders: Vec<u32> = chain.steps.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_second_active_chain_for_capability_is_rejected() {
        let registry = registry();
        registry.create_chain(branded_set("Branded Set")).await.unwrap();
        let result = registry.create_chain(branded_set("Branded Set v2")).await;
        assert!(matches!(
            result,
            Err(BillingError::ConflictingMapping { ref existing, .. }) if existing == "Branded Set"
        ));
    }

    #[tokio::test]
    async fn test_retired_chain_frees_the_capability() {
        let registry = registry();
        let first = registry.create_chain(branded_set("Branded Set")).await.unwrap();
        registry.deactivate_chain(first.id).await.unwrap();

        let second = registry.create_chain(branded_set("Branded Set v2")).await.unwrap();
        let resolved = registry
            .resolve_for_capability(Capability::BrandedSet)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, second.id);
        assert_eq!(registry.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_chain_name_is_rejected() {
        let registry = registry();
        let first = registry.create_chain(branded_set("Branded Set")).await.unwrap();
        assert!(matches!(
            registry.create_chain(branded_set("Branded Set")).await,
            Err(BillingError::DuplicateName { .. })
        ));

        // Retiring a chain does not release its name.
        registry.deactivate_chain(first.id).await.unwrap();
        assert!(matches!(
            registry.create_chain(branded_set("Branded Set")).await,
            Err(BillingError::DuplicateName { .. })
        ));
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_chain_requires_steps() {
        let registry = registry();
        let mut draft = branded_set("Empty");
        draft.steps.clear();
        assert!(matches!(
            registry.create_chain(draft).await,
            Err(BillingError::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_deactivate_unknown_chain() {
        let registry = registry();
        assert!(matches!(
            registry.deactivate_chain(ChainId(9)).await,
            Err(BillingError::NotFound { .. })
        ));
    }
}
