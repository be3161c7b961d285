use super::ConfigEvents;
use crate::domain::capability::Capability;
use crate::domain::engine::{Engine, EngineId, EngineUpdate, NewEngine, Status};
use crate::domain::ports::EngineStoreRef;
use crate::error::{BillingError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Admin surface over the engine records that supply per-capability costs.
#[derive(Clone)]
pub struct EngineRegistry {
    store: EngineStoreRef,
    events: ConfigEvents,
}

impl EngineRegistry {
    pub fn new(store: EngineStoreRef, events: ConfigEvents) -> Self {
        Self { store, events }
    }

    pub async fn create_engine(&self, engine: NewEngine) -> Result<Engine> {
        engine.validate()?;
        let engine = self.store.insert(engine).await?;
        self.events.notify();
        info!(
            id = %engine.id,
            name = %engine.name,
            capability = ?engine.capability,
            cost_usd = %engine.cost_usd_per_unit,
            markup = %engine.markup_percentage,
            "engine created"
        );
        Ok(engine)
    }

    /// Applies the supplied fields of `update`; the others keep their values.
    pub async fn update_engine(&self, id: EngineId, update: EngineUpdate) -> Result<Engine> {
        let mut engine = self.get(id).await?;
        engine.apply(update)?;
        self.store.store(engine.clone()).await?;
        self.events.notify();
        info!(id = %engine.id, name = %engine.name, "engine updated");
        Ok(engine)
    }

    /// Retires the engine. Retiring a retired engine is a no-op.
    pub async fn deactivate_engine(&self, id: EngineId) -> Result<Engine> {
        let mut engine = self.get(id).await?;
        if engine.is_active() {
            engine.status = Status::Retired;
            engine.updated_at = Utc::now();
            self.store.store(engine.clone()).await?;
            self.events.notify();
            info!(id = %engine.id, name = %engine.name, "engine retired");
        }
        Ok(engine)
    }

    pub async fn get(&self, id: EngineId) -> Result<Engine> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| BillingError::not_found("engine", id))
    }

    /// The active engine that prices `capability`.
    ///
    /// When several are active the one created first wins, and a warning is
    /// logged.
    pub async fn resolve_for_capability(&self, capability: Capability) -> Result<Option<Engine>> {
        let mut candidates = self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|engine| engine.serves(capability));

        let chosen = candidates.next();
        let others: Vec<String> = candidates.map(|engine| engine.name).collect();
        if let Some(engine) = &chosen
            && !others.is_empty()
        {
            warn!(
                %capability,
                chosen = %engine.name,
                ignored = ?others,
                "several active engines map to one capability"
            );
        }
        Ok(chosen)
    }

    /// Every engine in creation order, retired ones included.
    pub async fn list(&self) -> Result<Vec<Engine>> {
        self.store.all().await
    }

    /// Capabilities served by more than one active engine, with the engine
    /// names in creation order.
    pub async fn ambiguous_mappings(&self) -> Result<BTreeMap<Capability, Vec<String>>> {
        let mut mappings: BTreeMap<Capability, Vec<String>> = BTreeMap::new();
        for engine in self.store.all().await? {
            if let Some(capability) = engine.capability
                && engine.is_active()
            {
                mappings.entry(capability).or_default().push(engine.name);
            }
        }
        mappings.retain(|_, names| names.len() > 1);
        Ok(mappings)
    }
}
