use crate::core::types::{Portfolio, Signal, Transaction};
use crate::marketdata::client::QuoteSource;
use crate::universe::Universe;
use crate::universe::catalog::strip_exchange_suffix;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Splits blended scores into the sell set (< 0) and the buy set (>= 0).
/// Unscored stocks take no part in order placement.
pub fn classify(blended: &BTreeMap<String, Option<f64>>) -> (Vec<Signal>, Vec<Signal>) {
    let mut sells = Vec::new();
    let mut buys = Vec::new();

    for (symbol, sentiment) in blended {
        let Some(sentiment) = *sentiment else {
            debug!(%symbol, "unscored stock skipped");
            continue;
        };
        let signal = Signal {
            symbol: strip_exchange_suffix(symbol).to_string(),
            sentiment,
        };
        if sentiment < 0.0 {
            sells.push(signal);
        } else {
            buys.push(signal);
        }
    }
    (sells, buys)
}

fn to_decimal(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or(Decimal::ZERO)
}

/// Cash available per unit of remaining sentiment; 0 unless the remaining
/// sentiment sum is positive. Saturates at `Decimal::MAX` for sums close
/// to zero.
pub fn buy_ratio(balance: Decimal, remaining: &[Signal]) -> Decimal {
    let total: Decimal = remaining.iter().map(|s| to_decimal(s.sentiment)).sum();
    if total > Decimal::ZERO {
        balance.checked_div(total).unwrap_or(Decimal::MAX)
    } else {
        Decimal::ZERO
    }
}

pub struct OrderAllocator<'a> {
    universe: &'a Universe,
    quotes: &'a dyn QuoteSource,
}

impl<'a> OrderAllocator<'a> {
    pub fn new(universe: &'a Universe, quotes: &'a dyn QuoteSource) -> Self {
        Self { universe, quotes }
    }

    async fn price_of(&self, scrip: &str) -> Result<Decimal> {
        let quote = self
            .quotes
            .quote(scrip)
            .await
            .with_context(|| format!("quoting scrip {scrip}"))?;
        Ok(quote.current_value)
    }

    /// Applies the sells then the buys to `portfolio` and returns the
    /// executed transactions in execution order. Nothing is persisted here.
    pub async fn allocate(
        &self,
        blended: &BTreeMap<String, Option<f64>>,
        portfolio: &mut Portfolio,
    ) -> Result<Vec<Transaction>> {
        let (sells, buys) = classify(blended);
        info!(sells = sells.len(), buys = buys.len(), "orders classified");

        let mut transactions = self.execute_sells(&sells, portfolio).await?;
        transactions.extend(self.execute_buys(buys, portfolio).await?);

        metrics::gauge!("portfolio_balance").set(portfolio.balance.to_f64().unwrap_or(0.0));
        Ok(transactions)
    }

    /// Liquidates every lot held for each sell signal.
    pub async fn execute_sells(
        &self,
        sells: &[Signal],
        portfolio: &mut Portfolio,
    ) -> Result<Vec<Transaction>> {
        let mut transactions = Vec::new();

        for signal in sells {
            if portfolio.lots_of(&signal.symbol).is_empty() {
                debug!(symbol = %signal.symbol, "sell signal for stock not held");
                continue;
            }

            while let Some(&idx) = portfolio.lots_of(&signal.symbol).first() {
                let scrip = portfolio.stocks[idx].scrip.clone();
                let price = self.price_of(&scrip).await?;
                if price <= Decimal::ZERO {
                    warn!(symbol = %signal.symbol, %price, "non-positive quote, lots kept");
                    break;
                }
                let tx = portfolio.liquidate(idx, price);

                info!(
                    symbol = %tx.symbol,
                    qty = tx.qty,
                    bought = %tx.purchase_price,
                    price = %price,
                    "sold lot"
                );
                metrics::counter!("orders_executed_total", "action" => "sell").increment(1);
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    /// Greedy allocation in ascending sentiment order. The ratio is
    /// recomputed over the not-yet-processed signals after every purchase.
    pub async fn execute_buys(
        &self,
        mut buys: Vec<Signal>,
        portfolio: &mut Portfolio,
    ) -> Result<Vec<Transaction>> {
        let mut transactions = Vec::new();
        buys.sort_by(|a, b| a.sentiment.total_cmp(&b.sentiment));

        let mut ratio = buy_ratio(portfolio.balance, &buys);
        debug!(%ratio, "initial buy ratio");

        for (index, signal) in buys.iter().enumerate() {
            let scrip = portfolio
                .find_lot(&signal.symbol)
                .map(|lot| lot.scrip.clone())
                .or_else(|| {
                    self.universe
                        .by_symbol(&signal.symbol)
                        .and_then(|stock| stock.scrip.clone())
                });
            let Some(scrip) = scrip else {
                warn!(symbol = %signal.symbol, "buy target not in portfolio or universe, skipped");
                continue;
            };

            let budget = to_decimal(signal.sentiment)
                .checked_mul(ratio)
                .map_or(portfolio.balance, |b| b.min(portfolio.balance));
            let price = self.price_of(&scrip).await?;
            if price <= Decimal::ZERO {
                warn!(symbol = %signal.symbol, %price, "non-positive quote, skipped");
                continue;
            }

            let qty = (budget / price).floor().to_u64().unwrap_or(0);
            if qty == 0 {
                debug!(symbol = %signal.symbol, %budget, %price, "budget below one share");
                continue;
            }

            let tx = portfolio.open_lot(&signal.symbol, &scrip, qty, price);
            info!(symbol = %tx.symbol, qty, price = %price, balance = %portfolio.balance, "bought lot");
            metrics::counter!("orders_executed_total", "action" => "buy").increment(1);
            transactions.push(tx);

            ratio = buy_ratio(portfolio.balance, &buys[index + 1..]);
        }

        Ok(transactions)
    }
}
