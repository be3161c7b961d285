//! Price and margin arithmetic.
//!
//! All values are exact decimals. The final price is always rounded up so the
//! platform never sells below the computed price.

use super::capability::Capability;
use crate::error::{BillingError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Where the cost inputs of a quote came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum CostSource {
    FusionChain(String),
    Engine(String),
    Unconfigured,
}

impl CostSource {
    pub fn label(&self) -> String {
        match self {
            CostSource::FusionChain(name) => format!("chain:{name}"),
            CostSource::Engine(name) => format!("engine:{name}"),
            CostSource::Unconfigured => "unconfigured".to_string(),
        }
    }
}

/// Price and margin breakdown of one capability at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub capability: Capability,
    pub source: CostSource,
    pub foreign_cost: Decimal,
    pub exchange_rate: Decimal,
    pub local_cost: Decimal,
    pub markup_percentage: Decimal,
    /// Credits charged to the buyer.
    pub final_price: u64,
    pub margin: Decimal,
    pub margin_percentage: Decimal,
}

impl PriceQuote {
    /// Builds the quote for a configured cost source.
    pub fn compute(
        capability: Capability,
        source: CostSource,
        foreign_cost: Decimal,
        markup_percentage: Decimal,
        exchange_rate: Decimal,
    ) -> Result<Self> {
        let local_cost = foreign_cost.checked_mul(exchange_rate).ok_or_else(|| {
            BillingError::InvalidConfigValue(format!("local cost of {capability} overflows"))
        })?;
        let final_price = final_price(foreign_cost, markup_percentage, exchange_rate)?;
        let (margin, margin_percentage) = margin(final_price, local_cost);
        Ok(Self {
            capability,
            source,
            foreign_cost,
            exchange_rate,
            local_cost,
            markup_percentage,
            final_price,
            margin,
            margin_percentage,
        })
    }

    /// The quote of a capability that has no engine and no chain.
    pub fn unconfigured(capability: Capability, exchange_rate: Decimal) -> Self {
        Self {
            capability,
            source: CostSource::Unconfigured,
            foreign_cost: Decimal::ZERO,
            exchange_rate,
            local_cost: Decimal::ZERO,
            markup_percentage: Decimal::ZERO,
            final_price: 0,
            margin: Decimal::ZERO,
            margin_percentage: Decimal::ZERO,
        }
    }

    pub fn is_priced(&self) -> bool {
        self.final_price > 0
    }
}

/// `ceil(foreign_cost * rate * (1 + markup / 100))` in whole credits.
pub fn final_price(
    foreign_cost: Decimal,
    markup_percentage: Decimal,
    exchange_rate: Decimal,
) -> Result<u64> {
    let overflow = || BillingError::InvalidConfigValue("price computation overflows".to_string());
    let multiplier = Decimal::ONE
        .checked_add(markup_percentage.checked_div(dec!(100)).ok_or_else(overflow)?)
        .ok_or_else(overflow)?;
    let price = foreign_cost
        .checked_mul(exchange_rate)
        .and_then(|local| local.checked_mul(multiplier))
        .ok_or_else(overflow)?
        .ceil();
    price.to_u64().ok_or_else(overflow)
}

/// Absolute margin and its share of the final price in percent.
pub fn margin(final_price: u64, local_cost: Decimal) -> (Decimal, Decimal) {
    let price = Decimal::from(final_price);
    let margin = price - local_cost;
    let percentage = if final_price > 0 {
        margin / price * dec!(100)
    } else {
        Decimal::ZERO
    };
    (margin, percentage)
}
