use crate::core::types::Stock;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const EXCHANGE_SUFFIXES: &[&str] = &[".bs", ".ns", ".bo"];

/// Strips a trailing exchange suffix (".NS", ".BO", ...) from a symbol.
pub fn strip_exchange_suffix(symbol: &str) -> &str {
    let lower = symbol.to_ascii_lowercase();
    for suffix in EXCHANGE_SUFFIXES {
        if lower.ends_with(suffix) {
            return &symbol[..symbol.len() - suffix.len()];
        }
    }
    symbol
}

/// The static list of tradeable candidates plus a case-insensitive index of
/// every identifier a news item may use for them.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    stocks: Vec<Stock>,
    identifiers: HashMap<String, usize>,
}

impl Universe {
    pub fn new(stocks: Vec<Stock>) -> Self {
        let mut identifiers = HashMap::new();
        for (idx, stock) in stocks.iter().enumerate() {
            let symbol = stock.symbol.to_lowercase();
            let mut variants = vec![stock.name.to_lowercase(), symbol.clone()];
            variants.extend(EXCHANGE_SUFFIXES.iter().map(|s| format!("{symbol}{s}")));

            for v in variants {
                if !v.is_empty() {
                    identifiers.entry(v).or_insert(idx);
                }
            }
        }
        Self {
            stocks,
            identifiers,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading universe {}", path.display()))?;
        let stocks: Vec<Stock> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing universe {}", path.display()))?;
        Ok(Self::new(stocks))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.stocks).context("serializing universe")?;
        fs::write(path, json).with_context(|| format!("writing universe {}", path.display()))
    }

    pub fn stocks(&self) -> &[Stock] {
        &self.stocks
    }

    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    /// Resolves a name/symbol mention to its universe entry.
    pub fn resolve(&self, mention: &str) -> Option<&Stock> {
        self.identifiers
            .get(&mention.trim().to_lowercase())
            .map(|&idx| &self.stocks[idx])
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&Stock> {
        let bare = strip_exchange_suffix(symbol);
        self.stocks
            .iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(bare))
    }

    pub fn set_scrip(&mut self, symbol: &str, scrip: Option<String>) {
        if let Some(stock) = self
            .stocks
            .iter_mut()
            .find(|s| s.symbol.eq_ignore_ascii_case(symbol))
        {
            stock.scrip = scrip;
        }
    }
}
