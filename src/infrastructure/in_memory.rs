use crate::domain::account::{AccountId, CreditAccount};
use crate::domain::engine::{Engine, EngineId, NewEngine};
use crate::domain::fusion::{ChainId, FusionChain, NewFusionChain};
use crate::domain::generation::{Generation, GenerationId, NewGeneration};
use crate::domain::ledger::{BalanceChange, LedgerEntry, NewEntry};
use crate::domain::ports::{
    Backend, ConfigStore, EngineStore, FusionChainStore, GenerationStore, LedgerStore,
};
use crate::domain::rate::ConfigEntry;
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Builds a backend where every collection lives in process memory.
pub fn backend() -> Backend {
    Backend {
        config: Arc::new(InMemoryConfigStore::new()),
        engines: Arc::new(InMemoryEngineStore::new()),
        chains: Arc::new(InMemoryFusionChainStore::new()),
        ledger: Arc::new(InMemoryLedgerStore::new()),
        generations: Arc::new(InMemoryGenerationStore::new()),
    }
}

/// Named global scalars keyed by name.
#[derive(Default, Clone)]
pub struct InMemoryConfigStore {
    entries: Arc<RwLock<BTreeMap<String, ConfigEntry>>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, entry: ConfigEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<ConfigEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.values().cloned().collect())
    }
}

/// Engines keyed by id. `BTreeMap` keeps creation order for resolution.
#[derive(Default, Clone)]
pub struct InMemoryEngineStore {
    engines: Arc<RwLock<BTreeMap<EngineId, Engine>>>,
}

impl InMemoryEngineStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EngineStore for InMemoryEngineStore {
    async fn insert(&self, engine: NewEngine) -> Result<Engine> {
        let mut engines = self.engines.write().await;
        if engines.values().any(|e| e.name == engine.name) {
            return Err(BillingError::DuplicateName {
                kind: "engine",
                name: engine.name,
            });
        }
        let next = engines.keys().next_back().map_or(1, |id| id.0 + 1);
        let engine = engine.into_engine(EngineId(next));
        engines.insert(engine.id, engine.clone());
        Ok(engine)
    }

    async fn get(&self, id: EngineId) -> Result<Option<Engine>> {
        let engines = self.engines.read().await;
        Ok(engines.get(&id).cloned())
    }

    async fn store(&self, engine: Engine) -> Result<()> {
        let mut engines = self.engines.write().await;
        engines.insert(engine.id, engine);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Engine>> {
        let engines = self.engines.read().await;
        Ok(engines.values().cloned().collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryFusionChainStore {
    chains: Arc<RwLock<BTreeMap<ChainId, FusionChain>>>,
}

impl InMemoryFusionChainStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FusionChainStore for InMemoryFusionChainStore {
    async fn insert(&self, chain: NewFusionChain) -> Result<FusionChain> {
        let mut chains = self.chains.write().await;
        if chains.values().any(|c| c.name == chain.name) {
            return Err(BillingError::DuplicateName {
                kind: "fusion chain",
                name: chain.name,
            });
        }
        let next = chains.keys().next_back().map_or(1, |id| id.0 + 1);
        let chain = chain.into_chain(ChainId(next));
        chains.insert(chain.id, chain.clone());
        Ok(chain)
    }

    async fn get(&self, id: ChainId) -> Result<Option<FusionChain>> {
        let chains = self.chains.read().await;
        Ok(chains.get(&id).cloned())
    }

    async fn store(&self, chain: FusionChain) -> Result<()> {
        let mut chains = self.chains.write().await;
        chains.insert(chain.id, chain);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<FusionChain>> {
        let chains = self.chains.read().await;
        Ok(chains.values().cloned().collect())
    }
}

#[derive(Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, CreditAccount>,
    entries: HashMap<AccountId, Vec<LedgerEntry>>,
    refs: HashMap<String, LedgerEntry>,
    last_seq: u64,
}

/// Balances and their ledger entries behind a single lock, so the
/// sufficiency check, the balance update and the append happen together.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn account(&self, id: AccountId) -> Result<Option<CreditAccount>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(&id).cloned())
    }

    async fn accounts(&self) -> Result<Vec<CreditAccount>> {
        let state = self.state.read().await;
        Ok(state.accounts.values().cloned().collect())
    }

    async fn apply(
        &self,
        id: AccountId,
        change: BalanceChange,
        entry: NewEntry,
    ) -> Result<(CreditAccount, LedgerEntry)> {
        let mut state = self.state.write().await;

        if let Some(external_ref) = &entry.external_ref
            && state.refs.contains_key(external_ref)
        {
            return Err(BillingError::DuplicateReference(external_ref.clone()));
        }

        let mut account = match (state.accounts.get(&id), change) {
            (Some(account), _) => account.clone(),
            (None, BalanceChange::Credit(_)) => CreditAccount::new(id),
            (None, _) => return Err(BillingError::not_found("account", id)),
        };

        // Works on a copy; nothing is written unless the change is valid.
        let delta = account.apply(change)?;
        let seq = state.last_seq + 1;
        let recorded = LedgerEntry::record(seq, id, delta, entry);
        account.last_seq = Some(seq);

        state.last_seq = seq;
        if let Some(external_ref) = &recorded.external_ref {
            state.refs.insert(external_ref.clone(), recorded.clone());
        }
        state.entries.entry(id).or_default().push(recorded.clone());
        state.accounts.insert(id, account.clone());
        Ok((account, recorded))
    }

    async fn entries(&self, id: AccountId) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state.entries.get(&id).cloned().unwrap_or_default())
    }

    async fn find_by_ref(&self, external_ref: &str) -> Result<Option<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state.refs.get(external_ref).cloned())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryGenerationStore {
    generations: Arc<RwLock<BTreeMap<GenerationId, Generation>>>,
}

impl InMemoryGenerationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GenerationStore for InMemoryGenerationStore {
    async fn insert(&self, generation: NewGeneration) -> Result<Generation> {
        let mut generations = self.generations.write().await;
        let next = generations.keys().next_back().map_or(1, |id| id.0 + 1);
        let generation = generation.into_generation(GenerationId(next));
        generations.insert(generation.id, generation.clone());
        Ok(generation)
    }

    async fn get(&self, id: GenerationId) -> Result<Option<Generation>> {
        let generations = self.generations.read().await;
        Ok(generations.get(&id).cloned())
    }

    async fn store(&self, generation: Generation) -> Result<()> {
        let mut generations = self.generations.write().await;
        generations.insert(generation.id, generation);
        Ok(())
    }

    async fn for_account(&self, account: AccountId) -> Result<Vec<Generation>> {
        let generations = self.generations.read().await;
        Ok(generations
            .values()
            .rev()
            .filter(|g| g.account == account)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::CreditAmount;
    use crate::domain::capability::Capability;
    use crate::domain::generation::GenerationStatus;
    use crate::domain::ledger::EntryKind;
    use rust_decimal_macros::dec;

    fn credit(amount: u64) -> BalanceChange {
        BalanceChange::Credit(CreditAmount::new(amount).unwrap())
    }

    fn debit(amount: u64) -> BalanceChange {
        BalanceChange::Debit(CreditAmount::new(amount).unwrap())
    }

    #[tokio::test]
    async fn test_in_memory_config_store() {
        let store = InMemoryConfigStore::new();
        assert!(store.get("usd_to_local_rate").await.unwrap().is_none());

        store
            .put(ConfigEntry::new("usd_to_local_rate", dec!(92.5), None))
            .await
            .unwrap();
        let entry = store.get("usd_to_local_rate").await.unwrap().unwrap();
        assert_eq!(entry.value, dec!(92.5));
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_engine_ids_follow_creation_order() {
        let store = InMemoryEngineStore::new();
        let a = store
            .insert(NewEngine::new("a", dec!(0.1), dec!(100), None))
            .await
            .unwrap();
        let b = store
            .insert(NewEngine::new("b", dec!(0.1), dec!(100), None))
            .await
            .unwrap();
        assert_eq!(a.id, EngineId(1));
        assert_eq!(b.id, EngineId(2));
        let names: Vec<String> = store.all().await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_engine_duplicate_name_rejected() {
        let store = InMemoryEngineStore::new();
        store
            .insert(NewEngine::new("DALL-E 3", dec!(0.2), dec!(400), None))
            .await
            .unwrap();
        let result = store
            .insert(NewEngine::new("DALL-E 3", dec!(0.1), dec!(100), None))
            .await;
        assert!(matches!(result, Err(BillingError::DuplicateName { .. })));
        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_credit_opens_account() {
        let store = InMemoryLedgerStore::new();
        let (account, entry) = store
            .apply(AccountId(1), credit(100), NewEntry::new(EntryKind::Bonus, "welcome"))
            .await
            .unwrap();
        assert_eq!(account.balance, 100);
        assert_eq!(entry.seq, 1);
        assert_eq!(entry.credits_change, 100);
        assert_eq!(account.last_seq, Some(1));
    }

    #[tokio::test]
    async fn test_ledger_debit_unknown_account() {
        let store = InMemoryLedgerStore::new();
        let result = store
            .apply(AccountId(9), debit(1), NewEntry::new(EntryKind::CreditUsage, "x"))
            .await;
        assert!(matches!(result, Err(BillingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_ledger_rejected_debit_writes_nothing() {
        let store = InMemoryLedgerStore::new();
        store
            .apply(AccountId(1), credit(45), NewEntry::new(EntryKind::Bonus, "seed"))
            .await
            .unwrap();
        let result = store
            .apply(AccountId(1), debit(120), NewEntry::new(EntryKind::CreditUsage, "x"))
            .await;
        assert!(matches!(
            result,
            Err(BillingError::InsufficientBalance {
                required: 120,
                available: 45
            })
        ));
        assert_eq!(store.account(AccountId(1)).await.unwrap().unwrap().balance, 45);
        assert_eq!(store.entries(AccountId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_duplicate_reference() {
        let store = InMemoryLedgerStore::new();
        let entry = NewEntry::new(EntryKind::CreditPurchase, "pack")
            .with_ref(Some("mock_1".to_string()));
        store.apply(AccountId(1), credit(10), entry.clone()).await.unwrap();
        let result = store.apply(AccountId(1), credit(10), entry).await;
        assert!(matches!(result, Err(BillingError::DuplicateReference(_))));
        assert!(store.find_by_ref("mock_1").await.unwrap().is_some());
        assert_eq!(store.account(AccountId(1)).await.unwrap().unwrap().balance, 10);
    }

    #[tokio::test]
    async fn test_generation_history_newest_first() {
        let store = InMemoryGenerationStore::new();
        for (account, prompt) in [(1, "first"), (2, "other"), (1, "second")] {
            store
                .insert(NewGeneration {
                    account: AccountId(account),
                    capability: Capability::StaticImage,
                    cost: 100,
                    prompt: prompt.to_string(),
                    parameters: serde_json::Value::Null,
                    status: GenerationStatus::Processing,
                })
                .await
                .unwrap();
        }
        let prompts: Vec<String> = store
            .for_account(AccountId(1))
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.prompt)
            .collect();
        assert_eq!(prompts, vec!["second", "first"]);
    }
}
