use super::account::{AccountId, CreditAccount};
use super::engine::{Engine, EngineId, NewEngine};
use super::fusion::{ChainId, FusionChain, NewFusionChain};
use super::generation::{Generation, GenerationId, GenerationRequest, NewGeneration, UpstreamOutput};
use super::ledger::{BalanceChange, LedgerEntry, NewEntry};
use super::payment::{PaymentIntent, PaymentMetadata};
use super::rate::ConfigEntry;
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>>;
    async fn put(&self, entry: ConfigEntry) -> Result<()>;
    async fn all(&self) -> Result<Vec<ConfigEntry>>;
}

#[async_trait]
pub trait EngineStore: Send + Sync {
    /// Assigns the next id. Fails with `DuplicateName` if the name is taken.
    async fn insert(&self, engine: NewEngine) -> Result<Engine>;
    async fn get(&self, id: EngineId) -> Result<Option<Engine>>;
    async fn store(&self, engine: Engine) -> Result<()>;
    /// Every engine, ascending by id.
    async fn all(&self) -> Result<Vec<Engine>>;
}

#[async_trait]
pub trait FusionChainStore: Send + Sync {
    /// Assigns the next id. Fails with `DuplicateName` if the name is taken.
    async fn insert(&self, chain: NewFusionChain) -> Result<FusionChain>;
    async fn get(&self, id: ChainId) -> Result<Option<FusionChain>>;
    async fn store(&self, chain: FusionChain) -> Result<()>;
    /// Every chain, ascending by id.
    async fn all(&self) -> Result<Vec<FusionChain>>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn account(&self, id: AccountId) -> Result<Option<CreditAccount>>;
    async fn accounts(&self) -> Result<Vec<CreditAccount>>;
    /// Applies `change` and appends the entry recording it as one atomic step.
    ///
    /// Debits and overrides of unknown accounts fail with `NotFound`; credits
    /// open the account. A debit the balance cannot cover fails with
    /// `InsufficientBalance` and writes nothing. A reused external reference
    /// fails with `DuplicateReference`.
    async fn apply(
        &self,
        id: AccountId,
        change: BalanceChange,
        entry: NewEntry,
    ) -> Result<(CreditAccount, LedgerEntry)>;
    /// Entries of one account in sequence order.
    async fn entries(&self, id: AccountId) -> Result<Vec<LedgerEntry>>;
    async fn find_by_ref(&self, external_ref: &str) -> Result<Option<LedgerEntry>>;
}

#[async_trait]
pub trait GenerationStore: Send + Sync {
    async fn insert(&self, generation: NewGeneration) -> Result<Generation>;
    async fn get(&self, id: GenerationId) -> Result<Option<Generation>>;
    async fn store(&self, generation: Generation) -> Result<()>;
    /// Generations of one account, newest first.
    async fn for_account(&self, account: AccountId) -> Result<Vec<Generation>>;
}

/// Upstream AI provider. Any error is treated as a failed generation.
#[async_trait]
pub trait UpstreamGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<UpstreamOutput>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(
        &self,
        amount: Decimal,
        description: &str,
        metadata: PaymentMetadata,
    ) -> Result<PaymentIntent>;
}

pub type ConfigStoreRef = Arc<dyn ConfigStore>;
pub type EngineStoreRef = Arc<dyn EngineStore>;
pub type FusionChainStoreRef = Arc<dyn FusionChainStore>;
pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type GenerationStoreRef = Arc<dyn GenerationStore>;
pub type UpstreamGeneratorRef = Arc<dyn UpstreamGenerator>;
pub type PaymentGatewayRef = Arc<dyn PaymentGateway>;

/// The persisted collections, all served by one storage backend.
#[derive(Clone)]
pub struct Backend {
    pub config: ConfigStoreRef,
    pub engines: EngineStoreRef,
    pub chains: FusionChainStoreRef,
    pub ledger: LedgerStoreRef,
    pub generations: GenerationStoreRef,
}

impl Backend {
    /// Uses one value that implements every store trait.
    pub fn shared<S>(store: S) -> Self
    where
        S: ConfigStore
            + EngineStore
            + FusionChainStore
            + LedgerStore
            + GenerationStore
            + Clone
            + 'static,
    {
        Self {
            config: Arc::new(store.clone()),
            engines: Arc::new(store.clone()),
            chains: Arc::new(store.clone()),
            ledger: Arc::new(store.clone()),
            generations: Arc::new(store),
        }
    }
}
