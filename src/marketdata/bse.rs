use crate::config::config::QuoteCfg;
use crate::core::error::SourceError;
use crate::marketdata::client::{Quote, QuoteSource};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BseQuoteResponse {
    #[serde(default, rename = "securityID")]
    security_id: Option<String>,
    #[serde(default)]
    current_value: Option<Value>,
    #[serde(default)]
    company_name: Option<String>,
}

pub struct BseQuoteClient {
    client: Client,
    cfg: QuoteCfg,
}

impl BseQuoteClient {
    pub fn new(cfg: QuoteCfg, client: Client) -> Self {
        Self { client, cfg }
    }

    fn quote_url(&self, scrip: &str) -> String {
        format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), scrip)
    }
}

/// The quote service reports prices either as numbers or as strings such
/// as "2,345.60".
fn parse_price(v: &Value) -> Option<Decimal> {
    match v {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(&s.replace(',', "")).ok(),
        _ => None,
    }
}

#[async_trait]
impl QuoteSource for BseQuoteClient {
    async fn quote(&self, scrip: &str) -> Result<Quote, SourceError> {
        let resp = self.client.get(self.quote_url(scrip)).send().await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SourceError::InactiveStock(scrip.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let raw: BseQuoteResponse = serde_json::from_str(&body)?;

        let security_id = match raw.security_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => return Err(SourceError::NoSecurityId(scrip.to_string())),
        };
        let current_value = raw
            .current_value
            .as_ref()
            .and_then(parse_price)
            .ok_or_else(|| SourceError::Malformed(format!("no currentValue for scrip {scrip}")))?;

        Ok(Quote {
            scrip: scrip.to_string(),
            security_id,
            current_value,
            company_name: raw.company_name,
        })
    }
}
