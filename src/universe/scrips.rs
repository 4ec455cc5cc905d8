use crate::core::error::SourceError;
use crate::core::retry::Sleeper;
use crate::marketdata::client::{Quote, QuoteSource};
use crate::universe::catalog::Universe;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Wait before asking again for a quote that came back without a security id.
pub const SECURITY_ID_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Exchange scrip-code table: scrip code -> company name.
pub type ScripTable = BTreeMap<String, String>;

pub fn load_scrip_table(path: &Path) -> Result<ScripTable> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading scrip table {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing scrip table {}", path.display()))
}

/// Quotes `scrip`, asking once more after a pause when the reply has no
/// security id.
async fn quote_candidate(
    quotes: &dyn QuoteSource,
    sleeper: &dyn Sleeper,
    scrip: &str,
) -> Result<Quote, SourceError> {
    match quotes.quote(scrip).await {
        Err(SourceError::NoSecurityId(_)) => {
            debug!(%scrip, "quote without security id, asking again");
            sleeper.sleep(SECURITY_ID_RETRY_DELAY).await;
            quotes.quote(scrip).await
        }
        res => res,
    }
}

/// Fills in the scrip code of every universe stock. Candidates are codes
/// whose company name contains the stock name; the first one whose quoted
/// security id equals the stock symbol wins. Inactive codes are skipped.
/// Returns the number of stocks resolved.
pub async fn resolve_scrips(
    universe: &mut Universe,
    table: &ScripTable,
    quotes: &dyn QuoteSource,
    sleeper: &dyn Sleeper,
) -> Result<usize> {
    let mut resolved = 0;
    let stocks = universe.stocks().to_vec();

    for stock in stocks {
        let needle = stock.name.to_lowercase();
        let candidates = table
            .iter()
            .filter(|(_, company)| company.to_lowercase().contains(&needle));

        let mut found = None;
        for (scrip, company) in candidates {
            debug!(symbol = %stock.symbol, %scrip, %company, "checking scrip candidate");
            match quote_candidate(quotes, sleeper, scrip).await {
                Ok(quote) if quote.security_id.eq_ignore_ascii_case(&stock.symbol) => {
                    found = Some(scrip.clone());
                    break;
                }
                Ok(_) => continue,
                Err(SourceError::InactiveStock(_)) => {
                    info!(%scrip, "Inactive stock skipped");
                    continue;
                }
                Err(SourceError::NoSecurityId(_)) => {
                    warn!(%scrip, "still no security id, candidate skipped");
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("quoting scrip {scrip}"));
                }
            }
        }

        match &found {
            Some(scrip) => {
                info!(symbol = %stock.symbol, %scrip, "scrip resolved");
                resolved += 1;
            }
            None => warn!(symbol = %stock.symbol, "no scrip code found"),
        }
        universe.set_scrip(&stock.symbol, found);
    }

    Ok(resolved)
}
