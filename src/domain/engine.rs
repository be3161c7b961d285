use super::capability::Capability;
use crate::error::{BillingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineId(pub u32);

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a priced catalog row. Rows are retired, never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Retired,
}

impl Status {
    pub fn from_active(active: bool) -> Self {
        if active { Status::Active } else { Status::Retired }
    }
}

/// Upstream provider of one capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    pub id: EngineId,
    pub name: String,
    pub description: Option<String>,
    pub role: Option<String>,
    /// Upstream price of one unit in USD.
    pub cost_usd_per_unit: Decimal,
    /// 300 means the local cost is multiplied by 4.
    pub markup_percentage: Decimal,
    pub status: Status,
    pub capability: Option<Capability>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Engine {
    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    pub fn serves(&self, capability: Capability) -> bool {
        self.is_active() && self.capability == Some(capability)
    }

    /// Applies the supplied fields of `update` in place.
    pub fn apply(&mut self, update: EngineUpdate) -> Result<()> {
        update.validate()?;
        if let Some(cost) = update.cost_usd_per_unit {
            self.cost_usd_per_unit = cost;
        }
        if let Some(markup) = update.markup_percentage {
            self.markup_percentage = markup;
        }
        if let Some(capability) = update.capability {
            self.capability = capability;
        }
        if let Some(active) = update.active {
            self.status = Status::from_active(active);
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(role) = update.role {
            self.role = Some(role);
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Admin input for a new engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEngine {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub cost_usd_per_unit: Decimal,
    pub markup_percentage: Decimal,
    #[serde(default)]
    pub capability: Option<Capability>,
}

impl NewEngine {
    pub fn new(
        name: impl Into<String>,
        cost_usd_per_unit: Decimal,
        markup_percentage: Decimal,
        capability: Option<Capability>,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            role: None,
            cost_usd_per_unit,
            markup_percentage,
            capability,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BillingError::InvalidParameter(
                "engine name must not be empty".to_string(),
            ));
        }
        non_negative("cost_usd_per_unit", self.cost_usd_per_unit)?;
        non_negative("markup_percentage", self.markup_percentage)?;
        Ok(())
    }

    pub fn into_engine(self, id: EngineId) -> Engine {
        let now = Utc::now();
        Engine {
            id,
            name: self.name,
            description: self.description,
            role: self.role,
            cost_usd_per_unit: self.cost_usd_per_unit,
            markup_percentage: self.markup_percentage,
            status: Status::Active,
            capability: self.capability,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update; `None` leaves a field untouched.
///
/// `capability: Some(None)` clears the mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineUpdate {
    pub cost_usd_per_unit: Option<Decimal>,
    pub markup_percentage: Option<Decimal>,
    pub capability: Option<Option<Capability>>,
    pub active: Option<bool>,
    pub description: Option<String>,
    pub role: Option<String>,
}

impl EngineUpdate {
    pub fn validate(&self) -> Result<()> {
        if let Some(cost) = self.cost_usd_per_unit {
            non_negative("cost_usd_per_unit", cost)?;
        }
        if let Some(markup) = self.markup_percentage {
            non_negative("markup_percentage", markup)?;
        }
        Ok(())
    }
}

pub(crate) fn non_negative(field: &str, value: Decimal) -> Result<Decimal> {
    if value < Decimal::ZERO {
        Err(BillingError::InvalidParameter(format!(
            "{field} must be >= 0, got {value}"
        )))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn engine() -> Engine {
        NewEngine::new("DALL-E 3", dec!(0.20), dec!(400), Some(Capability::StaticImage))
            .into_engine(EngineId(1))
    }

    #[test]
    fn test_new_engine_rejects_negative_cost() {
        let draft = NewEngine::new("broken", dec!(-0.01), dec!(100), None);
        assert!(matches!(
            draft.validate(),
            Err(BillingError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_new_engine_accepts_zero_cost_and_markup() {
        let draft = NewEngine::new("free", dec!(0), dec!(0), None);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_apply_only_touches_supplied_fields() {
        let mut engine = engine();
        engine
            .apply(EngineUpdate {
                markup_percentage: Some(dec!(250)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(engine.markup_percentage, dec!(250));
        assert_eq!(engine.cost_usd_per_unit, dec!(0.20));
        assert_eq!(engine.capability, Some(Capability::StaticImage));
        assert!(engine.is_active());
    }

    #[test]
    fn test_apply_rejects_negative_markup_without_mutation() {
        let mut engine = engine();
        let result = engine.apply(EngineUpdate {
            cost_usd_per_unit: Some(dec!(1.0)),
            markup_percentage: Some(dec!(-5)),
            ..Default::default()
        });
        assert!(result.is_err());
        assert_eq!(engine.cost_usd_per_unit, dec!(0.20));
    }

    #[test]
    fn test_serves_requires_active_and_mapping() {
        let mut engine = engine();
        assert!(engine.serves(Capability::StaticImage));
        assert!(!engine.serves(Capability::VideoMorph));
        engine.status = Status::Retired;
        assert!(!engine.serves(Capability::StaticImage));
    }
}
