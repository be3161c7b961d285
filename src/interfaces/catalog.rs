use crate::application::Platform;
use crate::domain::catalog::Catalog;
use crate::domain::engine::NewEngine;
use crate::domain::fusion::NewFusionChain;
use crate::domain::rate::USD_TO_LOCAL_RATE;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

const DEFAULT_CATALOG: &str = include_str!("../../catalog/default.json");

/// Pricing configuration and products loaded at startup.
///
/// Decimal values are written as JSON strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub exchange_rate: Option<Decimal>,
    #[serde(default)]
    pub engines: Vec<NewEngine>,
    #[serde(default)]
    pub fusion_chains: Vec<NewFusionChain>,
    #[serde(flatten)]
    pub products: Catalog,
}

impl CatalogFile {
    pub fn parse(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        file.products.validate()?;
        Ok(file)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// The built-in catalog with the marketplace's launch prices.
    pub fn builtin() -> Result<Self> {
        Self::parse(DEFAULT_CATALOG)
    }

    /// Writes the rate, engines and chains through the platform's registries.
    ///
    /// Only missing values are written: a stored rate and engines or chains
    /// whose name already exists are left as they are, so admin changes to a
    /// persistent database survive reseeding.
    pub async fn seed(&self, platform: &Platform) -> Result<()> {
        if let Some(rate) = self.exchange_rate {
            match platform.rates.entry(USD_TO_LOCAL_RATE).await? {
                Some(stored) => debug!(stored = %stored.value, "exchange rate already set"),
                None => {
                    platform.rates.set_rate(rate).await?;
                }
            }
        }

        let engines: HashSet<String> = platform
            .engines
            .list()
            .await?
            .into_iter()
            .map(|e| e.name)
            .collect();
        for engine in &self.engines {
            if engines.contains(&engine.name) {
                debug!(name = %engine.name, "engine already registered");
                continue;
            }
            platform.engines.create_engine(engine.clone()).await?;
        }

        let chains: HashSet<String> = platform
            .chains
            .list()
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();
        for chain in &self.fusion_chains {
            if chains.contains(&chain.name) {
                debug!(name = %chain.name, "fusion chain already registered");
                continue;
            }
            platform.chains.create_chain(chain.clone()).await?;
        }
        Ok(())
    }
}
