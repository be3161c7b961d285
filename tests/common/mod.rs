#![allow(dead_code)]

use async_trait::async_trait;
use creditline::application::Platform;
use creditline::config::Settings;
use creditline::domain::account::AccountId;
use creditline::domain::generation::{
    Generation, GenerationId, GenerationRequest, NewGeneration, UpstreamOutput,
};
use creditline::domain::ports::{Backend, GenerationStore, UpstreamGenerator};
use creditline::error::{BillingError, Result};
use creditline::infrastructure::in_memory::{self, InMemoryGenerationStore};
use creditline::infrastructure::payment_mock::MockPaymentGateway;
use creditline::infrastructure::upstream::MockUpstreamGenerator;
use creditline::interfaces::catalog::CatalogFile;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// In-memory platform seeded with the built-in catalog and an instant upstream.
pub async fn seeded_platform() -> Platform {
    platform_with(Arc::new(MockUpstreamGenerator::instant()), Duration::from_secs(10)).await
}

pub async fn platform_with(upstream: Arc<dyn UpstreamGenerator>, timeout: Duration) -> Platform {
    platform_on(in_memory::backend(), upstream, timeout).await
}

/// Seeded platform whose generation records live in `generations`.
pub async fn platform_with_generations(generations: Arc<dyn GenerationStore>) -> Platform {
    let backend = Backend {
        generations,
        ..in_memory::backend()
    };
    platform_on(backend, Arc::new(MockUpstreamGenerator::instant()), Duration::from_secs(10)).await
}

async fn platform_on(
    backend: Backend,
    upstream: Arc<dyn UpstreamGenerator>,
    timeout: Duration,
) -> Platform {
    let catalog = CatalogFile::builtin().unwrap();
    let platform = Platform::new(
        backend,
        catalog.products.clone(),
        upstream,
        Arc::new(MockPaymentGateway::new()),
        timeout,
    );
    catalog.seed(&platform).await.unwrap();
    platform
}

pub fn instant_settings() -> Settings {
    Settings {
        simulated_latency: false,
        ..Settings::default()
    }
}

/// Upstream that always reports an error.
pub struct FailingUpstream;

#[async_trait]
impl UpstreamGenerator for FailingUpstream {
    async fn generate(&self, request: &GenerationRequest) -> Result<UpstreamOutput> {
        Err(BillingError::UpstreamFailure(format!(
            "{} engine unavailable",
            request.capability
        )))
    }
}

/// Upstream that answers only after `delay`.
pub struct SlowUpstream {
    pub delay: Duration,
}

#[async_trait]
impl UpstreamGenerator for SlowUpstream {
    async fn generate(&self, request: &GenerationRequest) -> Result<UpstreamOutput> {
        tokio::time::sleep(self.delay).await;
        MockUpstreamGenerator::instant().generate(request).await
    }
}

/// Generation store that can be told to fail on the n-th insert or on every
/// update of an existing record.
#[derive(Default)]
pub struct FlakyGenerationStore {
    inner: InMemoryGenerationStore,
    fail_insert_at: Option<usize>,
    fail_updates: bool,
    inserts: AtomicUsize,
}

impl FlakyGenerationStore {
    /// Fails the `n`-th insert (1-based) and every insert after it.
    pub fn failing_insert(n: usize) -> Self {
        Self {
            fail_insert_at: Some(n),
            ..Self::default()
        }
    }

    pub fn failing_updates() -> Self {
        Self {
            fail_updates: true,
            ..Self::default()
        }
    }
}

fn disk_full() -> BillingError {
    BillingError::Storage(Box::new(Error::other("disk full")))
}

#[async_trait]
impl GenerationStore for FlakyGenerationStore {
    async fn insert(&self, generation: NewGeneration) -> Result<Generation> {
        let n = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_insert_at.is_some_and(|at| n >= at) {
            return Err(disk_full());
        }
        self.inner.insert(generation).await
    }

    async fn get(&self, id: GenerationId) -> Result<Option<Generation>> {
        self.inner.get(id).await
    }

    async fn store(&self, generation: Generation) -> Result<()> {
        if self.fail_updates {
            return Err(disk_full());
        }
        self.inner.store(generation).await
    }

    async fn for_account(&self, account: AccountId) -> Result<Vec<Generation>> {
        self.inner.for_account(account).await
    }
}

/// Writes `rows` credit operations of one credit each for account 1.
pub fn generate_ops_csv(path: &Path, rows: usize) -> std::result::Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["type", "account", "amount", "capability", "reason"])?;
    for i in 1..=rows {
        wtr.write_record(["credit", "1", "1", "", &format!("row {i}")])?;
    }

    wtr.flush()?;
    Ok(())
}
