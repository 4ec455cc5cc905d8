use crate::core::types::Transaction;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::info;

pub const HEADER: [&str; 7] = [
    "timestamp",
    "action",
    "symbol",
    "scrip",
    "qty",
    "purchase_price",
    "execution_price",
];

/// Append-only CSV log, one row per executed order.
pub struct TransactionLog {
    path: PathBuf,
}

impl TransactionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Appends `transactions`; the header is written only into a new or
    /// empty file. An empty batch leaves the file untouched.
    pub fn append(&self, transactions: &[Transaction]) -> Result<()> {
        if transactions.is_empty() {
            info!("no transactions to log");
            return Ok(());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening transaction log {}", self.path.display()))?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(HEADER)?;
        }
        for tx in transactions {
            writer.write_record([
                tx.timestamp.to_rfc3339(),
                tx.action.to_string(),
                tx.symbol.clone(),
                tx.scrip.clone(),
                tx.qty.to_string(),
                tx.purchase_price.to_string(),
                tx.execution_price.to_string(),
            ])?;
        }
        writer.flush()?;

        info!(count = transactions.len(), path = %self.path.display(), "transactions logged");
        Ok(())
    }
}
