use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Key of the USD to local currency exchange rate.
pub const USD_TO_LOCAL_RATE: &str = "usd_to_local_rate";

/// Local currency units per USD used while no rate has been configured.
pub const DEFAULT_USD_TO_LOCAL_RATE: Decimal = dec!(100.0);

/// A named global scalar such as the exchange rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: Decimal,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every write to the key.
    pub version: u64,
}

impl ConfigEntry {
    pub fn new(key: impl Into<String>, value: Decimal, description: Option<String>) -> Self {
        Self {
            key: key.into(),
            value,
            description,
            updated_at: Utc::now(),
            version: 1,
        }
    }

    /// Returns the entry that replaces `self` with a new value.
    pub fn revised(&self, value: Decimal) -> Self {
        Self {
            key: self.key.clone(),
            value,
            description: self.description.clone(),
            updated_at: Utc::now(),
            version: self.version + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_bumps_version_and_keeps_description() {
        let entry = ConfigEntry::new(USD_TO_LOCAL_RATE, dec!(90), Some("rate".into()));
        let next = entry.revised(dec!(95.5));
        assert_eq!(next.version, 2);
        assert_eq!(next.value, dec!(95.5));
        assert_eq!(next.description.as_deref(), Some("rate"));
        assert!(next.updated_at >= entry.updated_at);
    }
}
