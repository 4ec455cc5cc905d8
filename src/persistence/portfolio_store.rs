use crate::core::types::Portfolio;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// JSON portfolio file, read fully once and overwritten fully once per run.
pub struct PortfolioStore {
    path: PathBuf,
}

impl PortfolioStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Portfolio> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading portfolio {}", self.path.display()))?;
        let portfolio: Portfolio = serde_json::from_str(&raw)
            .with_context(|| format!("parsing portfolio {}", self.path.display()))?;

        anyhow::ensure!(
            !portfolio.balance.is_sign_negative(),
            "portfolio balance is negative"
        );
        Ok(portfolio)
    }

    /// Writes a sibling temp file and renames it over the target.
    pub fn save(&self, portfolio: &Portfolio) -> Result<()> {
        let json = serde_json::to_string_pretty(portfolio).context("serializing portfolio")?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing portfolio {}", self.path.display()))?;

        info!(
            path = %self.path.display(),
            balance = %portfolio.balance,
            pnl = %portfolio.pnl,
            positions = portfolio.stocks.len(),
            "portfolio saved"
        );
        Ok(())
    }
}
