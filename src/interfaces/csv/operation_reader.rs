use crate::application::Platform;
use crate::domain::account::{AccountId, Principal};
use crate::domain::capability::Capability;
use crate::domain::generation::GenerationRequest;
use crate::domain::ledger::EntryKind;
use crate::error::{BillingError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Adds `amount` credits as a bonus.
    Credit,
    Debit,
    /// Overrides the balance with `amount`.
    Adjust,
    /// Purchases one generation of `capability`, using `reason` as prompt.
    Generate,
    /// Purchases the bundle whose id is `amount`.
    Bundle,
}

/// One row of an operations file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: OperationType,
    pub account: AccountId,
    pub amount: Option<u64>,
    pub capability: Option<Capability>,
    pub reason: Option<String>,
}

impl Operation {
    fn amount(&self) -> Result<u64> {
        self.amount.ok_or_else(|| {
            BillingError::InvalidParameter(format!("{:?} operation requires an amount", self.kind))
        })
    }

    fn reason(&self) -> &str {
        self.reason.as_deref().unwrap_or("csv import")
    }

    /// Applies the operation through the platform's services.
    pub async fn execute(&self, platform: &Platform, premium: bool) -> Result<()> {
        let identity = Principal::new(self.account, premium);
        match self.kind {
            OperationType::Credit => {
                platform
                    .ledger
                    .credit(
                        self.account,
                        self.amount()?,
                        EntryKind::Bonus,
                        self.reason(),
                        Decimal::ZERO,
                        None,
                    )
                    .await?;
            }
            OperationType::Debit => {
                platform
                    .ledger
                    .debit(self.account, self.amount()?, self.reason())
                    .await?;
            }
            OperationType::Adjust => {
                platform
                    .ledger
                    .set_balance(self.account, self.amount()?, self.reason())
                    .await?;
            }
            OperationType::Generate => {
                let capability = self.capability.ok_or_else(|| {
                    BillingError::InvalidParameter("generate operation requires a capability".to_string())
                })?;
                let prompt = self.reason.clone().unwrap_or_default();
                platform
                    .purchases
                    .purchase_generation(&identity, GenerationRequest::new(capability, prompt))
                    .await?;
            }
            OperationType::Bundle => {
                let bundle_id = u32::try_from(self.amount()?).map_err(|_| {
                    BillingError::InvalidParameter("bundle id is out of range".to_string())
                })?;
                platform.purchases.purchase_bundle(&identity, bundle_id).await?;
            }
        }
        Ok(())
    }
}

/// Reads operations from a CSV source, trimming whitespace and tolerating
/// rows with trailing fields left out.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes one operation per row.
    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(BillingError::from))
    }
}
