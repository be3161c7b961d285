use crate::domain::account::{AccountId, CreditAccount};
use crate::domain::engine::{Engine, EngineId, NewEngine};
use crate::domain::fusion::{ChainId, FusionChain, NewFusionChain};
use crate::domain::generation::{Generation, GenerationId, NewGeneration};
use crate::domain::ledger::{BalanceChange, LedgerEntry, NewEntry};
use crate::domain::ports::{ConfigStore, EngineStore, FusionChainStore, GenerationStore, LedgerStore};
use crate::domain::rate::ConfigEntry;
use crate::error::{BillingError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for named global scalars.
pub const CF_CONFIG: &str = "config";
/// Column Family for engines, keyed by big-endian id.
pub const CF_ENGINES: &str = "engines";
/// Column Family for fusion chains, keyed by big-endian id.
pub const CF_CHAINS: &str = "fusion_chains";
/// Column Family for account balance projections.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for ledger entries, keyed by account then sequence.
pub const CF_LEDGER: &str = "ledger";
/// Column Family mapping external payment references to ledger keys.
pub const CF_LEDGER_REFS: &str = "ledger_refs";
/// Column Family for generation records.
pub const CF_GENERATIONS: &str = "generations";
/// Column Family for counters.
pub const CF_META: &str = "meta";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_CONFIG,
    CF_ENGINES,
    CF_CHAINS,
    CF_ACCOUNTS,
    CF_LEDGER,
    CF_LEDGER_REFS,
    CF_GENERATIONS,
    CF_META,
];

const LEDGER_SEQ: &[u8] = b"ledger_seq";
const GENERATION_SEQ: &[u8] = b"generation_seq";

/// A persistent store implementation using RocksDB.
///
/// Every collection gets its own Column Family. Writes that must land together
/// (an account balance and the entry recording its change) go through one
/// `WriteBatch`, and read-check-write sequences hold `write_lock`.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating any
    /// missing column family.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            BillingError::Storage(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(cf)?, key, bytes)?;
        Ok(())
    }

    /// Values whose key starts with `prefix`, in key order.
    fn scan<T: DeserializeOwned>(&self, cf: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let handle = self.cf(cf)?;
        let mut values = Vec::new();
        let iter = self
            .db
            .iterator_cf(handle, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    /// Id following the largest big-endian u32 key in `cf`.
    fn next_id(&self, cf: &str) -> Result<u32> {
        let mut iter = self.db.iterator_cf(self.cf(cf)?, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                let bytes: [u8; 4] = key[..].try_into().map_err(|_| corrupt_key(cf))?;
                Ok(u32::from_be_bytes(bytes) + 1)
            }
            None => Ok(1),
        }
    }

    fn counter(&self, key: &[u8]) -> Result<u64> {
        match self.db.get_cf(self.cf(CF_META)?, key)? {
            Some(bytes) => {
                let bytes: [u8; 8] = bytes[..].try_into().map_err(|_| corrupt_key(CF_META))?;
                Ok(u64::from_be_bytes(bytes))
            }
            None => Ok(0),
        }
    }
}

fn corrupt_key(cf: &str) -> BillingError {
    BillingError::Storage(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("malformed key in {cf}"),
    )))
}

fn ledger_key(account: AccountId, seq: u64) -> Vec<u8> {
    let mut key = account.0.to_be_bytes().to_vec();
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

#[async_trait]
impl ConfigStore for RocksDBStore {
    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>> {
        self.get_json(CF_CONFIG, key.as_bytes())
    }

    async fn put(&self, entry: ConfigEntry) -> Result<()> {
        self.put_json(CF_CONFIG, entry.key.as_bytes(), &entry)
    }

    async fn all(&self) -> Result<Vec<ConfigEntry>> {
        self.scan(CF_CONFIG, &[])
    }
}

#[async_trait]
impl EngineStore for RocksDBStore {
    async fn insert(&self, engine: NewEngine) -> Result<Engine> {
        let _guard = self.write_lock.lock().await;
        let existing: Vec<Engine> = self.scan(CF_ENGINES, &[])?;
        if existing.iter().any(|e| e.name == engine.name) {
            return Err(BillingError::DuplicateName {
                kind: "engine",
                name: engine.name,
            });
        }
        let engine = engine.into_engine(EngineId(self.next_id(CF_ENGINES)?));
        self.put_json(CF_ENGINES, &engine.id.0.to_be_bytes(), &engine)?;
        Ok(engine)
    }

    async fn get(&self, id: EngineId) -> Result<Option<Engine>> {
        self.get_json(CF_ENGINES, &id.0.to_be_bytes())
    }

    async fn store(&self, engine: Engine) -> Result<()> {
        self.put_json(CF_ENGINES, &engine.id.0.to_be_bytes(), &engine)
    }

    async fn all(&self) -> Result<Vec<Engine>> {
        self.scan(CF_ENGINES, &[])
    }
}

#[async_trait]
impl FusionChainStore for RocksDBStore {
    async fn insert(&self, chain: NewFusionChain) -> Result<FusionChain> {
        let _guard = self.write_lock.lock().await;
        let existing: Vec<FusionChain> = self.scan(CF_CHAINS, &[])?;
        if existing.iter().any(|c| c.name == chain.name) {
            return Err(BillingError::DuplicateName {
                kind: "fusion chain",
                name: chain.name,
            });
        }
        let chain = chain.into_chain(ChainId(self.next_id(CF_CHAINS)?));
        self.put_json(CF_CHAINS, &chain.id.0.to_be_bytes(), &chain)?;
        Ok(chain)
    }

    async fn get(&self, id: ChainId) -> Result<Option<FusionChain>> {
        self.get_json(CF_CHAINS, &id.0.to_be_bytes())
    }

    async fn store(&self, chain: FusionChain) -> Result<()> {
        self.put_json(CF_CHAINS, &chain.id.0.to_be_bytes(), &chain)
    }

    async fn all(&self) -> Result<Vec<FusionChain>> {
        self.scan(CF_CHAINS, &[])
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn account(&self, id: AccountId) -> Result<Option<CreditAccount>> {
        self.get_json(CF_ACCOUNTS, &id.0.to_be_bytes())
    }

    async fn accounts(&self) -> Result<Vec<CreditAccount>> {
        self.scan(CF_ACCOUNTS, &[])
    }

    async fn apply(
        &self,
        id: AccountId,
        change: BalanceChange,
        entry: NewEntry,
    ) -> Result<(CreditAccount, LedgerEntry)> {
        let _guard = self.write_lock.lock().await;

        if let Some(external_ref) = &entry.external_ref
            && self
                .db
                .get_pinned_cf(self.cf(CF_LEDGER_REFS)?, external_ref.as_bytes())?
                .is_some()
        {
            return Err(BillingError::DuplicateReference(external_ref.clone()));
        }

        let stored: Option<CreditAccount> = self.get_json(CF_ACCOUNTS, &id.0.to_be_bytes())?;
        let mut account = match (stored, change) {
            (Some(account), _) => account,
            (None, BalanceChange::Credit(_)) => CreditAccount::new(id),
            (None, _) => return Err(BillingError::not_found("account", id)),
        };

        let delta = account.apply(change)?;
        let seq = self.counter(LEDGER_SEQ)? + 1;
        let recorded = LedgerEntry::record(seq, id, delta, entry);
        account.last_seq = Some(seq);

        let key = ledger_key(id, seq);
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_LEDGER)?, &key, serde_json::to_vec(&recorded)?);
        batch.put_cf(
            self.cf(CF_ACCOUNTS)?,
            id.0.to_be_bytes(),
            serde_json::to_vec(&account)?,
        );
        batch.put_cf(self.cf(CF_META)?, LEDGER_SEQ, seq.to_be_bytes());
        if let Some(external_ref) = &recorded.external_ref {
            batch.put_cf(self.cf(CF_LEDGER_REFS)?, external_ref.as_bytes(), &key);
        }
        self.db.write(batch)?;

        Ok((account, recorded))
    }

    async fn entries(&self, id: AccountId) -> Result<Vec<LedgerEntry>> {
        self.scan(CF_LEDGER, &id.0.to_be_bytes())
    }

    async fn find_by_ref(&self, external_ref: &str) -> Result<Option<LedgerEntry>> {
        match self.db.get_cf(self.cf(CF_LEDGER_REFS)?, external_ref.as_bytes())? {
            Some(key) => self.get_json(CF_LEDGER, &key),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl GenerationStore for RocksDBStore {
    async fn insert(&self, generation: NewGeneration) -> Result<Generation> {
        let _guard = self.write_lock.lock().await;
        let id = self.counter(GENERATION_SEQ)? + 1;
        let generation = generation.into_generation(GenerationId(id));

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_GENERATIONS)?,
            id.to_be_bytes(),
            serde_json::to_vec(&generation)?,
        );
        batch.put_cf(self.cf(CF_META)?, GENERATION_SEQ, id.to_be_bytes());
        self.db.write(batch)?;
        Ok(generation)
    }

    async fn get(&self, id: GenerationId) -> Result<Option<Generation>> {
        self.get_json(CF_GENERATIONS, &id.0.to_be_bytes())
    }

    async fn store(&self, generation: Generation) -> Result<()> {
        self.put_json(CF_GENERATIONS, &generation.id.0.to_be_bytes(), &generation)
    }

    async fn for_account(&self, account: AccountId) -> Result<Vec<Generation>> {
        let all: Vec<Generation> = self.scan(CF_GENERATIONS, &[])?;
        Ok(all.into_iter().rev().filter(|g| g.account == account).collect())
    }
}
