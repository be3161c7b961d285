//! Services built on the domain ports.

pub mod engines;
pub mod fusion;
pub mod ledger;
pub mod payments;
pub mod pricing;
pub mod purchase;
pub mod rates;

use crate::config::Settings;
use crate::domain::catalog::Catalog;
use crate::domain::ports::{Backend, PaymentGatewayRef, UpstreamGeneratorRef};
use crate::infrastructure::in_memory;
use crate::infrastructure::payment_mock::MockPaymentGateway;
use crate::infrastructure::upstream::MockUpstreamGenerator;
use engines::EngineRegistry;
use fusion::FusionChainRegistry;
use ledger::CreditLedger;
use payments::PaymentService;
use pricing::{PriceBoard, PricingEngine};
use purchase::PurchaseService;
use rates::ExchangeRateStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Revision counter bumped by every pricing-relevant configuration write.
#[derive(Clone)]
pub struct ConfigEvents {
    sender: Arc<watch::Sender<u64>>,
}

impl ConfigEvents {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn notify(&self) {
        self.sender.send_modify(|revision| *revision += 1);
    }

    pub fn revision(&self) -> u64 {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.sender.subscribe()
    }
}

impl Default for ConfigEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Every service, wired to one storage backend.
#[derive(Clone)]
pub struct Platform {
    pub events: ConfigEvents,
    pub rates: ExchangeRateStore,
    pub engines: EngineRegistry,
    pub chains: FusionChainRegistry,
    pub pricing: PricingEngine,
    pub board: PriceBoard,
    pub ledger: CreditLedger,
    pub purchases: PurchaseService,
    pub payments: PaymentService,
    pub catalog: Arc<Catalog>,
}

impl Platform {
    pub fn new(
        backend: Backend,
        catalog: Catalog,
        upstream: UpstreamGeneratorRef,
        gateway: PaymentGatewayRef,
        upstream_timeout: Duration,
    ) -> Self {
        let events = ConfigEvents::new();
        let catalog = Arc::new(catalog);
        let rates = ExchangeRateStore::new(backend.config, events.clone());
        let engines = EngineRegistry::new(backend.engines, events.clone());
        let chains = FusionChainRegistry::new(backend.chains, events.clone());
        let pricing = PricingEngine::new(rates.clone(), engines.clone(), chains.clone());
        let board = PriceBoard::new(pricing.clone(), events.clone());
        let ledger = CreditLedger::new(backend.ledger);
        let purchases = PurchaseService::new(
            pricing.clone(),
            board.clone(),
            ledger.clone(),
            backend.generations,
            upstream,
            catalog.clone(),
            upstream_timeout,
        );
        let payments = PaymentService::new(gateway, ledger.clone(), catalog.clone());

        Self {
            events,
            rates,
            engines,
            chains,
            pricing,
            board,
            ledger,
            purchases,
            payments,
            catalog,
        }
    }

    /// Uses `backend` with the mock upstream and payment collaborators.
    pub fn with_mocks(backend: Backend, catalog: Catalog, settings: &Settings) -> Self {
        Self::new(
            backend,
            catalog,
            Arc::new(MockUpstreamGenerator::with_latency(settings.simulated_latency)),
            Arc::new(MockPaymentGateway::new()),
            settings.upstream_timeout,
        )
    }

    /// In-memory storage and mock collaborators.
    pub fn in_memory(catalog: Catalog, settings: &Settings) -> Self {
        Self::with_mocks(in_memory::backend(), catalog, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_config_events_wake_subscribers() {
        let events = ConfigEvents::new();
        let mut receiver = events.subscribe();

        events.notify();
        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow_and_update(), 1);
        assert_eq!(events.revision(), 1);
    }
}
