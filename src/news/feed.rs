use crate::config::config::NewsCfg;
use crate::core::error::SourceError;
use crate::core::types::Article;
use crate::news::client::NewsSource;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedResponse {
    #[serde(default)]
    total_results: u64,
    articles: Vec<Article>,
}

pub struct FeedNewsClient {
    client: Client,
    cfg: NewsCfg,
}

impl FeedNewsClient {
    pub fn new(cfg: NewsCfg, client: Client) -> Self {
        Self { client, cfg }
    }
}

/// Keeps the first `limit` articles and drops those without a description.
pub fn select_articles(articles: Vec<Article>, limit: usize) -> Vec<Article> {
    articles
        .into_iter()
        .take(limit)
        .filter(|a| match &a.description {
            Some(_) => true,
            None => {
                debug!(title = %a.title, "article without description skipped");
                false
            }
        })
        .collect()
}

#[async_trait]
impl NewsSource for FeedNewsClient {
    async fn fetch_articles(&self, limit: usize) -> Result<Vec<Article>, SourceError> {
        let resp = self.client.get(&self.cfg.url).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let feed: FeedResponse = serde_json::from_str(&body)?;
        info!(total = feed.total_results, "Total news articles");

        Ok(select_articles(feed.articles, limit))
    }
}
