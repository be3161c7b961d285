use super::ConfigEvents;
use super::engines::EngineRegistry;
use super::fusion::FusionChainRegistry;
use super::rates::ExchangeRateStore;
use crate::domain::capability::Capability;
use crate::domain::quote::{CostSource, PriceQuote};
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Computes the credit price of a capability from live configuration.
#[derive(Clone)]
pub struct PricingEngine {
    rates: ExchangeRateStore,
    engines: EngineRegistry,
    chains: FusionChainRegistry,
}

/// One row of the public price list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceListing {
    pub capability: Capability,
    pub price: u64,
    pub premium: bool,
    pub description: &'static str,
}

impl PricingEngine {
    pub fn new(rates: ExchangeRateStore, engines: EngineRegistry, chains: FusionChainRegistry) -> Self {
        Self {
            rates,
            engines,
            chains,
        }
    }

    /// Prices `capability`. An active fusion chain takes precedence over an
    /// engine; with neither, the quote is zero.
    pub async fn quote(&self, capability: Capability) -> Result<PriceQuote> {
        let rate = self.rates.get_rate().await?;

        if let Some(chain) = self.chains.resolve_for_capability(capability).await? {
            return PriceQuote::compute(
                capability,
                CostSource::FusionChain(chain.name),
                chain.total_cost_usd,
                chain.markup_percentage,
                rate,
            );
        }
        if let Some(engine) = self.engines.resolve_for_capability(capability).await? {
            return PriceQuote::compute(
                capability,
                CostSource::Engine(engine.name),
                engine.cost_usd_per_unit,
                engine.markup_percentage,
                rate,
            );
        }
        Ok(PriceQuote::unconfigured(capability, rate))
    }

    pub async fn quote_all<I>(&self, capabilities: I) -> Result<BTreeMap<Capability, PriceQuote>>
    where
        I: IntoIterator<Item = Capability>,
    {
        let mut quotes = BTreeMap::new();
        for capability in capabilities {
            quotes.insert(capability, self.quote(capability).await?);
        }
        Ok(quotes)
    }

    /// Quotes of every capability, configured or not.
    pub async fn margin_summary(&self) -> Result<Vec<PriceQuote>> {
        Ok(self.quote_all(Capability::ALL).await?.into_values().collect())
    }

    /// Sellable capabilities with their price, as shown to buyers.
    pub async fn price_list(&self) -> Result<Vec<PriceListing>> {
        Ok(self
            .margin_summary()
            .await?
            .into_iter()
            .filter(PriceQuote::is_priced)
            .map(|quote| PriceListing {
                capability: quote.capability,
                price: quote.final_price,
                premium: quote.capability.requires_subscription(),
                description: quote.capability.description(),
            })
            .collect())
    }
}

type Snapshot = Arc<BTreeMap<Capability, PriceQuote>>;

/// Quotes of every capability, recomputed on the first read after a
/// configuration change.
#[derive(Clone)]
pub struct PriceBoard {
    pricing: PricingEngine,
    events: ConfigEvents,
    cache: Arc<RwLock<Option<(u64, Snapshot)>>>,
}

impl PriceBoard {
    pub fn new(pricing: PricingEngine, events: ConfigEvents) -> Self {
        Self {
            pricing,
            events,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        let revision = self.events.revision();
        if let Some((cached, snapshot)) = self.cache.read().await.as_ref()
            && *cached == revision
        {
            return Ok(snapshot.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some((cached, snapshot)) = cache.as_ref()
            && *cached == revision
        {
            return Ok(snapshot.clone());
        }
        // Tagged with the revision read before computing, so a change that
        // lands meanwhile forces another refresh.
        let snapshot = Arc::new(self.pricing.quote_all(Capability::ALL).await?);
        *cache = Some((revision, snapshot.clone()));
        Ok(snapshot)
    }

    pub async fn quote(&self, capability: Capability) -> Result<PriceQuote> {
        let snapshot = self.snapshot().await?;
        match snapshot.get(&capability) {
            Some(quote) => Ok(quote.clone()),
            None => self.pricing.quote(capability).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::{EngineUpdate, NewEngine};
    use crate::domain::fusion::{FusionStep, NewFusionChain};
    use crate::infrastructure::in_memory::{
        InMemoryConfigStore, InMemoryEngineStore, InMemoryFusionChainStore,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    struct Fixture {
        rates: ExchangeRateStore,
        engines: EngineRegistry,
        chains: FusionChainRegistry,
        pricing: PricingEngine,
        events: ConfigEvents,
    }

    fn fixture() -> Fixture {
        let events = ConfigEvents::new();
        let rates = ExchangeRateStore::new(Arc::new(InMemoryConfigStore::new()), events.clone());
        let engines = EngineRegistry::new(Arc::new(InMemoryEngineStore::new()), events.clone());
        let chains =
            FusionChainRegistry::new(Arc::new(InMemoryFusionChainStore::new()), events.clone());
        let pricing = PricingEngine::new(rates.clone(), engines.clone(), chains.clone());
        Fixture {
            rates,
            engines,
            chains,
            pricing,
            events,
        }
    }

    fn chain(capability: Capability) -> NewFusionChain {
        NewFusionChain {
            name: "Branded Set".into(),
            description: None,
            capability,
            steps: vec![FusionStep {
                engine_name: "Recraft.ai".into(),
                order: 1,
                role: "vector base".into(),
            }],
            total_cost_usd: dec!(0.40),
            markup_percentage: dec!(400),
        }
    }

    #[tokio::test]
    async fn test_engine_quote() {
        let f = fixture();
        f.rates.set_rate(dec!(100.0)).await.unwrap();
        f.engines
            .create_engine(NewEngine::new("DALL-E 3", dec!(0.20), dec!(400), Some(Capability::StaticImage)))
            .await
            .unwrap();

        let quote = f.pricing.quote(Capability::StaticImage).await.unwrap();
        assert_eq!(quote.final_price, 100);
        assert_eq!(quote.source, CostSource::Engine("DALL-E 3".into()));
        assert_eq!(quote.margin, dec!(80));
    }

    #[tokio::test]
    async fn test_chain_beats_engine() {
        let f = fixture();
        f.engines
            .create_engine(NewEngine::new("Recraft.ai", dec!(0.30), dec!(300), Some(Capability::BrandedSet)))
            .await
            .unwrap();
        f.chains.create_chain(chain(Capability::BrandedSet)).await.unwrap();

        let quote = f.pricing.quote(Capability::BrandedSet).await.unwrap();
        assert_eq!(quote.source, CostSource::FusionChain("Branded Set".into()));
        assert_eq!(quote.foreign_cost, dec!(0.40));
        assert_eq!(quote.final_price, 200);
    }

    #[tokio::test]
    async fn test_unconfigured_capability_quotes_zero() {
        let f = fixture();
        f.rates.set_rate(dec!(90)).await.unwrap();
        let quote = f.pricing.quote(Capability::AiScoring).await.unwrap();
        assert_eq!(quote.final_price, 0);
        assert_eq!(quote.margin, Decimal::ZERO);
        assert_eq!(quote.exchange_rate, dec!(90));
        assert_eq!(quote.source, CostSource::Unconfigured);
    }

    #[tokio::test]
    async fn test_rate_change_reprices_without_touching_engines() {
        let f = fixture();
        f.engines
            .create_engine(NewEngine::new("DALL-E 3", dec!(0.20), dec!(400), Some(Capability::StaticImage)))
            .await
            .unwrap();
        f.rates.set_rate(dec!(120)).await.unwrap();
        assert_eq!(f.pricing.quote(Capability::StaticImage).await.unwrap().final_price, 120);
    }

    #[tokio::test]
    async fn test_price_list_only_lists_sellable_capabilities() {
        let f = fixture();
        f.engines
            .create_engine(NewEngine::new("GPT-4 Vision", dec!(0.30), dec!(400), Some(Capability::ContextualPhoto)))
            .await
            .unwrap();
        let list = f.pricing.price_list().await.unwrap();
        assert_eq!(
            list,
            vec![PriceListing {
                capability: Capability::ContextualPhoto,
                price: 150,
                premium: true,
                description: Capability::ContextualPhoto.description(),
            }]
        );
        assert_eq!(f.pricing.margin_summary().await.unwrap().len(), Capability::ALL.len());
    }

    #[tokio::test]
    async fn test_price_board_refreshes_after_config_change() {
        let f = fixture();
        let engine = f
            .engines
            .create_engine(NewEngine::new("DALL-E 3", dec!(0.20), dec!(400), Some(Capability::StaticImage)))
            .await
            .unwrap();
        let board = PriceBoard::new(f.pricing.clone(), f.events.clone());

        let first = board.snapshot().await.unwrap();
        assert_eq!(first[&Capability::StaticImage].final_price, 100);
        let again = board.snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        f.rates.set_rate(dec!(110)).await.unwrap();
        assert_eq!(board.quote(Capability::StaticImage).await.unwrap().final_price, 110);

        f.engines
            .update_engine(
                engine.id,
                EngineUpdate {
                    markup_percentage: Some(dec!(900)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(board.quote(Capability::StaticImage).await.unwrap().final_price, 220);
    }
}
