use super::ConfigEvents;
use crate::domain::ports::ConfigStoreRef;
use crate::domain::rate::{ConfigEntry, DEFAULT_USD_TO_LOCAL_RATE, USD_TO_LOCAL_RATE};
use crate::error::{BillingError, Result};
use rust_decimal::Decimal;
use tracing::info;

/// Global named scalars, chiefly the USD to local currency exchange rate.
///
/// Writes are last-writer-wins. Stored prices are never recomputed here;
/// readers that cache derived values are told through [`ConfigEvents`].
#[derive(Clone)]
pub struct ExchangeRateStore {
    store: ConfigStoreRef,
    events: ConfigEvents,
}

impl ExchangeRateStore {
    pub fn new(store: ConfigStoreRef, events: ConfigEvents) -> Self {
        Self { store, events }
    }

    /// Current rate, or [`DEFAULT_USD_TO_LOCAL_RATE`] when none was configured.
    pub async fn get_rate(&self) -> Result<Decimal> {
        self.get_value(USD_TO_LOCAL_RATE, DEFAULT_USD_TO_LOCAL_RATE).await
    }

    pub async fn set_rate(&self, rate: Decimal) -> Result<ConfigEntry> {
        self.set_value(
            USD_TO_LOCAL_RATE,
            rate,
            Some("USD to local currency exchange rate".to_string()),
        )
        .await
    }

    pub async fn get_value(&self, key: &str, default: Decimal) -> Result<Decimal> {
        Ok(self
            .store
            .get(key)
            .await?
            .map(|entry| entry.value)
            .unwrap_or(default))
    }

    /// Writes `value` under `key`, bumping the entry's version. A `None`
    /// description keeps the one already stored.
    pub async fn set_value(
        &self,
        key: &str,
        value: Decimal,
        description: Option<String>,
    ) -> Result<ConfigEntry> {
        if value <= Decimal::ZERO {
            return Err(BillingError::InvalidConfigValue(format!(
                "{key} must be positive, got {value}"
            )));
        }

        let entry = match self.store.get(key).await? {
            Some(existing) => {
                let mut next = existing.revised(value);
                if description.is_some() {
                    next.description = description;
                }
                next
            }
            None => ConfigEntry::new(key, value, description),
        };
        self.store.put(entry.clone()).await?;
        self.events.notify();

        info!(key, %value, version = entry.version, "config value updated");
        Ok(entry)
    }

    pub async fn entry(&self, key: &str) -> Result<Option<ConfigEntry>> {
        self.store.get(key).await
    }

    /// Every stored entry, for the admin listing.
    pub async fn entries(&self) -> Result<Vec<ConfigEntry>> {
        self.store.all().await
    }
}
