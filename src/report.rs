use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::registry::AccountRecord;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write ledger row: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush ledger: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Serialize)]
struct LedgerRow<'a> {
    identity: &'a str,
    label: &'a str,
    balance: u64,
    active: bool,
}

/// Write every account as csv, in registry order.
pub fn write_ledger(
    writer: impl io::Write,
    accounts: &[AccountRecord],
) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(writer);

    for account in accounts {
        writer.serialize(LedgerRow {
            identity: &account.owner,
            label: &account.label,
            balance: account.balance.value(),
            active: account.active,
        })?;
    }

    writer.flush()?;
    Ok(())
}
