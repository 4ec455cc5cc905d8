use crate::core::error::SourceError;
use async_trait::async_trait;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub scrip: String,
    pub security_id: String,
    pub current_value: Decimal,
    pub company_name: Option<String>,
}

#[async_trait]
pub trait QuoteSource: Send + Sync + 'static {
    /// Live quote for an exchange scrip code. Delisted or unknown codes
    /// yield `SourceError::InactiveStock`; a reply without a security id
    /// yields `SourceError::NoSecurityId`.
    async fn quote(&self, scrip: &str) -> Result<Quote, SourceError>;
}
