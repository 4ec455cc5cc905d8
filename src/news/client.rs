use crate::core::error::SourceError;
use crate::core::types::Article;
use async_trait::async_trait;

#[async_trait]
pub trait NewsSource: Send + Sync + 'static {
    /// Latest headlines that carry a description, at most `limit` of the
    /// feed's leading articles considered.
    async fn fetch_articles(&self, limit: usize) -> Result<Vec<Article>, SourceError>;
}
