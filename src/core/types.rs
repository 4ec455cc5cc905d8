use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ----------- Universe -----------------
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub scrip: Option<String>,
}

// ----------- News -----------------
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArticleSource {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub source: ArticleSource,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// LLM verdict for one article.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredArticle {
    #[serde(default)]
    pub stock: Vec<String>,
    pub sentiment: f64,
}

// ----------- Portfolio -----------------
/// One purchased lot. Lots of the same symbol are never merged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub scrip: String,
    pub qty: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(rename = "p/l", with = "rust_decimal::serde::float")]
    pub pnl: Decimal,
    #[serde(default)]
    pub stocks: Vec<Position>,
}

impl Portfolio {
    /// Indices of every lot held for `symbol`, in portfolio order.
    pub fn lots_of(&self, symbol: &str) -> Vec<usize> {
        self.stocks
            .iter()
            .enumerate()
            .filter(|(_, p)| p.symbol.eq_ignore_ascii_case(symbol))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn find_lot(&self, symbol: &str) -> Option<&Position> {
        self.stocks
            .iter()
            .find(|p| p.symbol.eq_ignore_ascii_case(symbol))
    }

    /// Sells the whole lot at `index` for `current_price`.
    /// Realised P/L is booked as (purchase - current) * qty.
    pub fn liquidate(&mut self, index: usize, current_price: Decimal) -> Transaction {
        let lot = self.stocks.remove(index);
        let qty = Decimal::from(lot.qty);
        self.balance += current_price * qty;
        self.pnl += (lot.price - current_price) * qty;

        Transaction {
            timestamp: Utc::now(),
            action: Action::Sell,
            symbol: lot.symbol,
            scrip: lot.scrip,
            qty: lot.qty,
            purchase_price: lot.price,
            execution_price: current_price,
        }
    }

    /// Opens a new lot. Caller guarantees `price * qty <= balance`.
    pub fn open_lot(&mut self, symbol: &str, scrip: &str, qty: u64, price: Decimal) -> Transaction {
        self.balance -= price * Decimal::from(qty);
        self.stocks.push(Position {
            symbol: symbol.to_string(),
            scrip: scrip.to_string(),
            qty,
            price,
        });

        Transaction {
            timestamp: Utc::now(),
            action: Action::Buy,
            symbol: symbol.to_string(),
            scrip: scrip.to_string(),
            qty,
            purchase_price: price,
            execution_price: price,
        }
    }
}

// ----------- Orders -----------------
#[derive(Clone, Debug, PartialEq, Eq, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "buy"),
            Action::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    pub symbol: String,
    pub scrip: String,
    pub qty: u64,
    pub purchase_price: Decimal,
    pub execution_price: Decimal,
}

/// Entry of the sell or buy set: symbol without exchange suffix, blended score.
#[derive(Clone, Debug, PartialEq)]
pub struct Signal {
    pub symbol: String,
    pub sentiment: f64,
}
