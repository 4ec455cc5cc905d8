use crate::config::config::MarketauxCfg;
use crate::core::error::SourceError;
use crate::secondary::client::{SecondaryNews, SecondarySentimentSource};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MarketauxReply {
    Failure { error: ApiErrorBody },
    News(SecondaryNews),
}

const QUOTA_CODES: &[&str] = &["usage_limit_reached", "rate_limit_reached"];

pub struct MarketauxClient {
    client: Client,
    cfg: MarketauxCfg,
    api_key: String,
    label: String,
}

impl MarketauxClient {
    pub fn new(cfg: MarketauxCfg, api_key: String, label: String, client: Client) -> Self {
        Self {
            client,
            cfg,
            api_key,
            label,
        }
    }

    /// One client per configured key, in priority order.
    pub fn from_cfg(cfg: &MarketauxCfg, client: &Client) -> Vec<MarketauxClient> {
        cfg.api_keys
            .iter()
            .filter(|k| !k.is_empty())
            .enumerate()
            .map(|(i, key)| {
                let label = if i == 0 {
                    "marketaux-primary".to_string()
                } else {
                    format!("marketaux-fallback-{i}")
                };
                MarketauxClient::new(cfg.clone(), key.clone(), label, client.clone())
            })
            .collect()
    }

    fn news_url(&self) -> String {
        format!("{}/v1/news/all", self.cfg.base_url.trim_end_matches('/'))
    }
}

fn classify(status: StatusCode, reply: MarketauxReply) -> Result<SecondaryNews, SourceError> {
    match reply {
        MarketauxReply::Failure { error } => {
            if QUOTA_CODES.contains(&error.code.as_str())
                || status == StatusCode::PAYMENT_REQUIRED
                || status == StatusCode::TOO_MANY_REQUESTS
            {
                Err(SourceError::Quota)
            } else {
                Err(SourceError::Api {
                    code: error.code,
                    message: error.message,
                })
            }
        }
        MarketauxReply::News(_) if !status.is_success() => Err(SourceError::Status {
            status: status.as_u16(),
            body: String::new(),
        }),
        MarketauxReply::News(news) => Ok(news),
    }
}

#[async_trait]
impl SecondarySentimentSource for MarketauxClient {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch_news(&self, symbol: &str) -> Result<SecondaryNews, SourceError> {
        let symbols = format!("{}{}", symbol, self.cfg.symbol_suffix);
        let min_match = self.cfg.min_match_score.to_string();

        let resp = self
            .client
            .get(self.news_url())
            .query(&[
                ("symbols", symbols.as_str()),
                ("filter_entities", "true"),
                ("min_match_score", min_match.as_str()),
                ("countries", self.cfg.countries.as_str()),
                ("api_token", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        debug!(endpoint = %self.label, %status, "secondary sentiment response");

        match serde_json::from_str::<MarketauxReply>(&body) {
            Ok(reply) => classify(status, reply),
            Err(_) if !status.is_success() => {
                if status == StatusCode::PAYMENT_REQUIRED || status == StatusCode::TOO_MANY_REQUESTS {
                    Err(SourceError::Quota)
                } else {
                    Err(SourceError::Status {
                        status: status.as_u16(),
                        body,
                    })
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
