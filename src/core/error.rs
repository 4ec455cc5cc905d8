use thiserror::Error;

/// Failure at the boundary with an external collaborator (news feed, LLM,
/// sentiment API, quote service). Malformed payloads become `Malformed`
/// instead of panicking on a missing field.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("usage quota exhausted")]
    Quota,

    #[error("api error {code}: {message}")]
    Api { code: String, message: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid or inactive stock {0}")]
    InactiveStock(String),

    #[error("quote for {0} carries no security id")]
    NoSecurityId(String),

    #[error("source unavailable after {attempts} attempts")]
    Unavailable { attempts: u32 },
}

impl SourceError {
    /// Only quota exhaustion is worth waiting out.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Quota)
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(e: serde_json::Error) -> Self {
        SourceError::Malformed(e.to_string())
    }
}
