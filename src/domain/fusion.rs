use super::capability::Capability;
use super::engine::{Status, non_negative};
use crate::error::{BillingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u32);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One stage of a fusion chain. The engine may be a pseudo-engine such as a
/// post-processing pass that has no registry row of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionStep {
    pub engine_name: String,
    pub order: u32,
    pub role: String,
}

/// Ordered composition of engines priced as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionChain {
    pub id: ChainId,
    pub name: String,
    pub description: Option<String>,
    pub capability: Capability,
    /// Sorted by `order`.
    pub steps: Vec<FusionStep>,
    /// Authoritative aggregate upstream cost; not derived from the steps.
    pub total_cost_usd: Decimal,
    pub markup_percentage: Decimal,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FusionChain {
    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    pub fn serves(&self, capability: Capability) -> bool {
        self.is_active() && self.capability == capability
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFusionChain {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub capability: Capability,
    pub steps: Vec<FusionStep>,
    pub total_cost_usd: Decimal,
    pub markup_percentage: Decimal,
}

impl NewFusionChain {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BillingError::InvalidParameter(
                "fusion chain name must not be empty".to_string(),
            ));
        }
        if self.steps.is_empty() {
            return Err(BillingError::InvalidParameter(format!(
                "fusion chain '{}' needs at least one step",
                self.name
            )));
        }
        non_negative("total_cost_usd", self.total_cost_usd)?;
        non_negative("markup_percentage", self.markup_percentage)?;
        Ok(())
    }

    pub fn into_chain(self, id: ChainId) -> FusionChain {
        let now = Utc::now();
        let mut steps = self.steps;
        steps.sort_by_key(|step| step.order);
        FusionChain {
            id,
            name: self.name,
            description: self.description,
            capability: self.capability,
            steps,
            total_cost_usd: self.total_cost_usd,
            markup_percentage: self.markup_percentage,
            status: Status::Active,
            created_at: now,
            updated_at: now,
        }
    }
}
