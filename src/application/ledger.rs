use crate::domain::account::{AccountId, CreditAccount, CreditAmount};
use crate::domain::ledger::{AuditReport, BalanceChange, EntryKind, LedgerEntry, NewEntry};
use crate::domain::ports::LedgerStoreRef;
use crate::error::{BillingError, Result};
use rust_decimal::Decimal;
use tracing::info;

/// Credit balances and the append-only history explaining them.
///
/// Every mutation is a single `LedgerStore::apply` call, so the balance check,
/// the balance update and the entry append cannot interleave with another
/// mutation of the same store.
#[derive(Clone)]
pub struct CreditLedger {
    store: LedgerStoreRef,
}

impl CreditLedger {
    pub fn new(store: LedgerStoreRef) -> Self {
        Self { store }
    }

    /// Removes `amount` credits, or fails with `InsufficientBalance` and
    /// leaves the balance untouched.
    pub async fn debit(
        &self,
        account: AccountId,
        amount: u64,
        reason: &str,
    ) -> Result<(CreditAccount, LedgerEntry)> {
        let amount = CreditAmount::new(amount)?;
        self.store
            .apply(
                account,
                BalanceChange::Debit(amount),
                NewEntry::new(EntryKind::CreditUsage, reason),
            )
            .await
    }

    /// Adds `amount` credits, opening the account on first use.
    pub async fn credit(
        &self,
        account: AccountId,
        amount: u64,
        kind: EntryKind,
        reason: &str,
        amount_paid: Decimal,
        external_ref: Option<String>,
    ) -> Result<(CreditAccount, LedgerEntry)> {
        let amount = CreditAmount::new(amount)?;
        let entry = NewEntry::new(kind, reason)
            .paid(amount_paid)
            .with_ref(external_ref);
        let (account, entry) = self
            .store
            .apply(account, BalanceChange::Credit(amount), entry)
            .await?;
        info!(
            account = %account.id,
            credits = amount.value(),
            kind = ?entry.kind,
            balance = account.balance,
            "credits added"
        );
        Ok((account, entry))
    }

    /// Administrative override of an existing balance.
    pub async fn set_balance(
        &self,
        account: AccountId,
        new_balance: u64,
        reason: &str,
    ) -> Result<(CreditAccount, LedgerEntry)> {
        let (account, entry) = self
            .store
            .apply(
                account,
                BalanceChange::Set(new_balance),
                NewEntry::new(EntryKind::Adjustment, reason),
            )
            .await?;
        info!(
            account = %account.id,
            change = entry.credits_change,
            balance = account.balance,
            reason,
            "balance adjusted"
        );
        Ok((account, entry))
    }

    /// Current balance; accounts without history hold zero credits.
    pub async fn balance(&self, account: AccountId) -> Result<u64> {
        Ok(self
            .store
            .account(account)
            .await?
            .map(|a| a.balance)
            .unwrap_or(0))
    }

    pub async fn history(&self, account: AccountId) -> Result<Vec<LedgerEntry>> {
        self.store.entries(account).await
    }

    /// Replays the account's entries and compares the sum with its balance.
    pub async fn audit(&self, account: AccountId) -> Result<AuditReport> {
        let cached = self
            .store
            .account(account)
            .await?
            .ok_or_else(|| BillingError::not_found("account", account))?;
        let entries = self.store.entries(account).await?;
        Ok(AuditReport::from_entries(account, cached.balance, &entries))
    }

    /// Every known account in ascending id order.
    pub async fn accounts(&self) -> Result<Vec<CreditAccount>> {
        self.store.accounts().await
    }

    pub async fn find_by_ref(&self, external_ref: &str) -> Result<Option<LedgerEntry>> {
        self.store.find_by_ref(external_ref).await
    }
}
