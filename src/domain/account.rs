use super::ledger::BalanceChange;
use crate::error::{BillingError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u32);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A strictly positive number of credits.
///
/// Ledger debits and credits only accept this type, so a zero-credit entry
/// can never be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CreditAmount(u64);

impl CreditAmount {
    pub fn new(value: u64) -> Result<Self> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(BillingError::InvalidParameter(
                "credit amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for CreditAmount {
    type Error = BillingError;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CreditAmount> for u64 {
    fn from(amount: CreditAmount) -> Self {
        amount.0
    }
}

/// Cached balance projection of an account's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAccount {
    pub id: AccountId,
    pub balance: u64,
    /// Sequence of the latest entry applied to `balance`, if any.
    pub last_seq: Option<u64>,
}

impl CreditAccount {
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            balance: 0,
            last_seq: None,
        }
    }

    /// Removes `amount` if the balance covers it.
    pub fn withdraw(&mut self, amount: CreditAmount) -> Result<()> {
        if self.balance >= amount.value() {
            self.balance -= amount.value();
            Ok(())
        } else {
            Err(BillingError::InsufficientBalance {
                required: amount.value(),
                available: self.balance,
            })
        }
    }

    pub fn deposit(&mut self, amount: CreditAmount) -> Result<()> {
        self.balance = self.balance.checked_add(amount.value()).ok_or_else(|| {
            BillingError::InvalidParameter(format!("balance of account {} overflows", self.id))
        })?;
        Ok(())
    }

    /// Overwrites the balance and returns the signed delta that was applied.
    pub fn reset(&mut self, new_balance: u64) -> Result<i64> {
        let delta = i128::from(new_balance) - i128::from(self.balance);
        let delta = i64::try_from(delta).map_err(|_| {
            BillingError::InvalidParameter(format!("balance change of {delta} is out of range"))
        })?;
        self.balance = new_balance;
        Ok(delta)
    }

    /// Applies `change` and returns the signed credits delta. On error the
    /// account is left untouched.
    pub fn apply(&mut self, change: BalanceChange) -> Result<i64> {
        let signed = |amount: CreditAmount| {
            i64::try_from(amount.value()).map_err(|_| {
                BillingError::InvalidParameter(format!("amount {} is out of range", amount.value()))
            })
        };
        match change {
            BalanceChange::Debit(amount) => {
                let delta = -signed(amount)?;
                self.withdraw(amount)?;
                Ok(delta)
            }
            BalanceChange::Credit(amount) => {
                let delta = signed(amount)?;
                self.deposit(amount)?;
                Ok(delta)
            }
            BalanceChange::Set(new_balance) => self.reset(new_balance),
        }
    }
}

/// The caller of a purchase, as provided by the identity collaborator.
pub trait Identity: Send + Sync {
    fn account_id(&self) -> AccountId;
    /// True when the caller holds a paid subscription tier.
    fn has_premium_access(&self) -> bool;
}

/// Plain identity value for callers that already resolved the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub account: AccountId,
    pub premium: bool,
}

impl Principal {
    pub fn new(account: AccountId, premium: bool) -> Self {
        Self { account, premium }
    }
}

impl Identity for Principal {
    fn account_id(&self) -> AccountId {
        self.account
    }

    fn has_premium_access(&self) -> bool {
        self.premium
    }
}
