use crate::core::error::SourceError;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecondaryNews {
    pub data: Vec<NewsItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsItem {
    #[serde(default)]
    pub entities: Vec<Entity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub highlights: Vec<Highlight>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Highlight {
    #[serde(default)]
    pub highlight: String,
    #[serde(default)]
    pub sentiment: Option<f64>,
}

impl SecondaryNews {
    /// Every entity-level highlight sentiment that is present and non-zero.
    pub fn highlight_sentiments(&self) -> impl Iterator<Item = f64> + '_ {
        self.data
            .iter()
            .flat_map(|item| item.entities.iter())
            .flat_map(|entity| entity.highlights.iter())
            .filter_map(|h| h.sentiment)
            .filter(|s| *s != 0.0)
    }
}

/// One credentialed endpoint of the secondary news-sentiment service.
#[async_trait]
pub trait SecondarySentimentSource: Send + Sync + 'static {
    /// Short label for logs (never the credential itself).
    fn label(&self) -> &str;

    async fn fetch_news(&self, symbol: &str) -> Result<SecondaryNews, SourceError>;
}
