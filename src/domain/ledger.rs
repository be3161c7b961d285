use super::account::{AccountId, CreditAmount};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Subscription,
    CreditPurchase,
    CreditUsage,
    Bonus,
    LibraryUnlock,
    Adjustment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    #[default]
    Completed,
    Failed,
}

/// Requested balance mutation. The store applies it atomically together with
/// the entry that records it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceChange {
    /// Conditional decrement; rejected when the balance does not cover it.
    Debit(CreditAmount),
    Credit(CreditAmount),
    /// Administrative override, no sufficiency check.
    Set(u64),
}

/// Everything about an entry the caller decides; the store fills in the
/// sequence, delta and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub amount: Decimal,
    pub reason: String,
    pub external_ref: Option<String>,
}

impl NewEntry {
    pub fn new(kind: EntryKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            amount: Decimal::ZERO,
            reason: reason.into(),
            external_ref: None,
        }
    }

    pub fn paid(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_ref(mut self, external_ref: Option<String>) -> Self {
        self.external_ref = external_ref;
        self
    }
}

/// Immutable record of one balance change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Global, strictly increasing.
    pub seq: u64,
    pub account: AccountId,
    pub kind: EntryKind,
    pub credits_change: i64,
    /// Money paid in local currency, zero for usage and adjustments.
    pub amount: Decimal,
    pub reason: String,
    pub external_ref: Option<String>,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn record(seq: u64, account: AccountId, credits_change: i64, entry: NewEntry) -> Self {
        Self {
            seq,
            account,
            kind: entry.kind,
            credits_change,
            amount: entry.amount,
            reason: entry.reason,
            external_ref: entry.external_ref,
            status: EntryStatus::Completed,
            created_at: Utc::now(),
        }
    }
}

/// Result of replaying an account's entries against its cached balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub account: AccountId,
    pub cached_balance: u64,
    pub replayed_balance: i128,
    pub entries: usize,
    pub ordered: bool,
}

impl AuditReport {
    pub fn from_entries(account: AccountId, cached_balance: u64, entries: &[LedgerEntry]) -> Self {
        let replayed_balance = entries
            .iter()
            .filter(|e| e.status == EntryStatus::Completed)
            .map(|e| i128::from(e.credits_change))
            .sum();
        let ordered = entries.windows(2).all(|w| w[0].seq < w[1].seq);
        Self {
            account,
            cached_balance,
            replayed_balance,
            entries: entries.len(),
            ordered,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.ordered && self.replayed_balance == i128::from(self.cached_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: u64, change: i64) -> LedgerEntry {
        LedgerEntry::record(seq, AccountId(1), change, NewEntry::new(EntryKind::Bonus, "t"))
    }

    #[test]
    fn test_audit_replays_entries() {
        let entries = vec![entry(1, 100), entry(4, -30), entry(7, 5)];
        let report = AuditReport::from_entries(AccountId(1), 75, &entries);
        assert_eq!(report.replayed_balance, 75);
        assert!(report.is_consistent());
    }

    #[test]
    fn test_audit_detects_drift() {
        let entries = vec![entry(1, 100)];
        let report = AuditReport::from_entries(AccountId(1), 90, &entries);
        assert!(!report.is_consistent());
    }

    #[test]
    fn test_audit_detects_disorder() {
        let entries = vec![entry(2, 10), entry(1, 10)];
        let report = AuditReport::from_entries(AccountId(1), 20, &entries);
        assert!(!report.ordered);
    }

    #[test]
    fn test_entry_kind_serialization() {
        let json = serde_json::to_string(&EntryKind::CreditUsage).unwrap();
        assert_eq!(json, "\"credit_usage\"");
    }
}
