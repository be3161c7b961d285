use crate::domain::account::{AccountId, CreditAccount};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRow {
    account: AccountId,
    balance: u64,
    entries: usize,
}

/// Writes final balances as `account,balance,entries` rows.
pub struct AccountWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> AccountWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// `accounts` pairs each account with its number of ledger entries.
    pub fn write_accounts<I>(&mut self, accounts: I) -> Result<()>
    where
        I: IntoIterator<Item = (CreditAccount, usize)>,
    {
        for (account, entries) in accounts {
            self.writer.serialize(AccountRow {
                account: account.id,
                balance: account.balance,
                entries,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_output() {
        let mut first = CreditAccount::new(AccountId(1));
        first.balance = 380;
        let second = CreditAccount::new(AccountId(2));

        let mut buffer = Vec::new();
        AccountWriter::new(&mut buffer)
            .write_accounts([(first, 2), (second, 1)])
            .unwrap();

        let output = String::from_utf8(buffer).unwrap();
        assert_eq!(output, "account,balance,entries\n1,380,2\n2,0,1\n");
    }
}
