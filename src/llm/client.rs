use crate::config::config::LlmCfg;
use crate::core::error::SourceError;
use crate::core::types::{Article, ScoredArticle};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, info};

const SYSTEM_PROMPT: &str = "You are an equity analyst with twenty years of experience judging how \
business news moves the Indian stock market. Given a news source, title and description, rate the \
sentiment between -1 and 1, where 1 means strongly buy and -1 means strongly sell, and list the \
NSE/BSE symbols of the top 100 stocks the article affects (symbols only). Respond with JSON matching \
{\"stock\": [\"\"], \"sentiment\": 0.4}. Do not provide any explanation or reasoning.";

#[async_trait]
pub trait SentimentScorer: Send + Sync + 'static {
    /// One LLM verdict for `article`. Quota exhaustion is reported as
    /// `SourceError::Quota` so callers can back off.
    async fn score(&self, article: &Article) -> Result<ScoredArticle, SourceError>;
}

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    cfg: LlmCfg,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

#[derive(Debug, Serialize)]
struct PromptPayload<'a> {
    source: &'a str,
    title: &'a str,
    description: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LlmClient {
    pub fn new(cfg: LlmCfg, client: Client) -> Self {
        let rpm = NonZeroU32::new(cfg.rate_limit_rpm).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Self {
            client,
            cfg,
            limiter,
        }
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    fn build_prompt(article: &Article) -> Result<String, SourceError> {
        let payload = PromptPayload {
            source: article.source.name.as_deref().unwrap_or(""),
            title: &article.title,
            description: article.description.as_deref().unwrap_or(""),
        };
        Ok(format!("analyse {}", serde_json::to_string(&payload)?))
    }
}

/// Strips markdown code fences the model sometimes wraps JSON in.
fn clean_content(content: &str) -> &str {
    content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

pub fn parse_verdict(content: &str) -> Result<ScoredArticle, SourceError> {
    let clean = clean_content(content);
    let mut verdict: ScoredArticle = serde_json::from_str(clean)
        .map_err(|e| SourceError::Malformed(format!("LLM JSON {clean:?}: {e}")))?;

    if !verdict.sentiment.is_finite() {
        return Err(SourceError::Malformed(format!(
            "non-finite sentiment in {clean:?}"
        )));
    }
    verdict.sentiment = verdict.sentiment.clamp(-1.0, 1.0);
    Ok(verdict)
}

#[async_trait]
impl SentimentScorer for LlmClient {
    async fn score(&self, article: &Article) -> Result<ScoredArticle, SourceError> {
        self.limiter.until_ready().await;

        let prompt = Self::build_prompt(article)?;
        let req_body = json!({
            "model": self.cfg.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
            "temperature": self.cfg.temperature,
            "response_format": {"type": "json_object"}
        });

        let url = format!("{}/chat/completions", self.cfg.base_url);
        info!("Calling LLM at {} with model {}", url, self.cfg.model);

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.cfg.api_key)
            .json(&req_body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
                return Err(SourceError::Quota);
            }
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = res.text().await?;
        let chat: ChatResponse = serde_json::from_str(&body)?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SourceError::Malformed("no content in LLM response".into()))?;

        let verdict = parse_verdict(&content)?;
        debug!(?verdict, "LLM verdict");
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ArticleSource;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn article() -> Article {
        Article {
            source: ArticleSource {
                name: Some("Mint".into()),
            },
            title: "Reliance posts record quarterly profit".into(),
            description: Some("Retail and Jio drive growth".into()),
        }
    }

    fn client(server: &MockServer) -> LlmClient {
        let cfg = LlmCfg {
            base_url: server.uri(),
            model: "test-model".into(),
            api_key: "secret".into(),
            temperature: 0.0,
            rate_limit_rpm: 1000,
        };
        LlmClient::new(cfg, Client::new())
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    #[test]
    fn test_parse_verdict_strips_fences_and_clamps() {
        let v = parse_verdict("```json\n{\"stock\": [\"RELIANCE\"], \"sentiment\": 1.7}\n```").unwrap();
        assert_eq!(v.stock, vec!["RELIANCE"]);
        assert_eq!(v.sentiment, 1.0);
    }

    #[test]
    fn test_parse_verdict_rejects_garbage() {
        assert!(matches!(
            parse_verdict("the market looks bullish"),
            Err(SourceError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_score_sends_article_and_parses_reply() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .and(body_string_contains("Reliance posts record quarterly profit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "{\"stock\": [\"RELIANCE\", \"JIO\"], \"sentiment\": 0.6}",
            )))
            .mount(&server)
            .await;

        let verdict = client(&server).score(&article()).await.unwrap();
        assert_eq!(verdict.stock, vec!["RELIANCE", "JIO"]);
        assert!((verdict.sentiment - 0.6).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_score_maps_429_to_quota() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = client(&server).score(&article()).await.unwrap_err();
        assert!(matches!(err, SourceError::Quota));
    }

    #[tokio::test]
    async fn test_score_without_choices_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client(&server).score(&article()).await.unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }
}
