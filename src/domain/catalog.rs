use super::capability::Capability;
use super::engine::Status;
use crate::error::{BillingError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleItem {
    pub capability: Capability,
    #[serde(default = "one")]
    pub quantity: u32,
}

/// Largest number of generations one bundle may open.
pub const MAX_BUNDLE_UNITS: u32 = 1_000;

fn one() -> u32 {
    1
}

/// A discounted set of generations bought in one purchase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreativeBundle {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub items: Vec<BundleItem>,
    pub discount_percent: u8,
    #[serde(default = "yes")]
    pub requires_subscription: bool,
    #[serde(default)]
    pub status: Status,
}

fn yes() -> bool {
    true
}

impl CreativeBundle {
    pub fn validate(&self) -> Result<()> {
        if self.items.is_empty() {
            return Err(BillingError::InvalidParameter(format!(
                "bundle '{}' has no items",
                self.name
            )));
        }
        if self.discount_percent > 100 {
            return Err(BillingError::InvalidParameter(format!(
                "bundle '{}' discount must be at most 100%",
                self.name
            )));
        }
        if self.items.iter().any(|item| item.quantity == 0) || self.units() > MAX_BUNDLE_UNITS {
            return Err(BillingError::InvalidParameter(format!(
                "bundle '{}' must have a quantity on every item and at most {MAX_BUNDLE_UNITS} units",
                self.name
            )));
        }
        Ok(())
    }

    pub fn units(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |total, item| total.saturating_add(item.quantity))
    }

    /// Discounted price of `base_price`, rounded down to whole credits.
    pub fn discounted(&self, base_price: u64) -> u64 {
        let keep = Decimal::from(100 - u32::from(self.discount_percent.min(100)));
        (Decimal::from(base_price) * keep / dec!(100))
            .floor()
            .to_u64()
            .unwrap_or(base_price)
    }
}

/// A one-off pack of credits sold for local currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditPackage {
    pub id: u32,
    pub name: String,
    pub credits: u64,
    pub price: Decimal,
    #[serde(default)]
    pub bonus_percent: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Status,
}

impl CreditPackage {
    pub fn validate(&self) -> Result<()> {
        if self.credits == 0 || self.checked_total_credits().is_none() {
            return Err(BillingError::InvalidParameter(format!(
                "package '{}' grants an invalid number of credits",
                self.name
            )));
        }
        Ok(())
    }

    fn checked_total_credits(&self) -> Option<u64> {
        let bonus = u128::from(self.credits) * u128::from(self.bonus_percent) / 100;
        u64::try_from(bonus).ok()?.checked_add(self.credits)
    }

    /// Credits granted on settlement, bonus included. Saturates for packages
    /// that fail validation.
    pub fn total_credits(&self) -> u64 {
        self.checked_total_credits().unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Starter,
    Pro,
    Agency,
}

impl SubscriptionTier {
    pub fn monthly_price(&self) -> Decimal {
        match self {
            SubscriptionTier::Free => Decimal::ZERO,
            SubscriptionTier::Starter => dec!(2990),
            SubscriptionTier::Pro => dec!(6990),
            SubscriptionTier::Agency => dec!(14990),
        }
    }

    pub fn included_credits(&self) -> u64 {
        match self {
            SubscriptionTier::Free => 50,
            SubscriptionTier::Starter => 1500,
            SubscriptionTier::Pro => 4000,
            SubscriptionTier::Agency => 10000,
        }
    }

    pub fn is_premium(&self) -> bool {
        *self != SubscriptionTier::Free
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Starter => "starter",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Agency => "agency",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "free" => Ok(SubscriptionTier::Free),
            "starter" => Ok(SubscriptionTier::Starter),
            "pro" => Ok(SubscriptionTier::Pro),
            "agency" => Ok(SubscriptionTier::Agency),
            other => Err(BillingError::InvalidParameter(format!(
                "unknown subscription tier '{other}'"
            ))),
        }
    }
}

/// Products sold besides single generations. Loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub bundles: Vec<CreativeBundle>,
    #[serde(default)]
    pub credit_packages: Vec<CreditPackage>,
}

impl Catalog {
    pub fn bundle(&self, id: u32) -> Option<&CreativeBundle> {
        self.bundles
            .iter()
            .find(|b| b.id == id && b.status == Status::Active)
    }

    pub fn package(&self, id: u32) -> Option<&CreditPackage> {
        self.credit_packages
            .iter()
            .find(|p| p.id == id && p.status == Status::Active)
    }

    pub fn validate(&self) -> Result<()> {
        self.bundles.iter().try_for_each(CreativeBundle::validate)?;
        self.credit_packages.iter().try_for_each(CreditPackage::validate)
    }
}
