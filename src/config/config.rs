use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppCfg {
    #[serde(default)]
    pub http: HttpCfg,
    #[serde(default)]
    pub news: NewsCfg,
    #[serde(default)]
    pub llm: LlmCfg,
    #[serde(default)]
    pub marketaux: MarketauxCfg,
    #[serde(default)]
    pub quotes: QuoteCfg,
    #[serde(default)]
    pub files: FilesCfg,
    #[serde(default)]
    pub strategy: StrategyCfg,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpCfg {
    #[serde(rename = "userAgent", default = "default_ua")]
    pub user_agent: String,
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    #[serde(
        rename = "poolIdleTimeout",
        with = "humantime_serde",
        default = "default_pool_idle"
    )]
    pub pool_idle_timeout: Duration,
    #[serde(rename = "poolMaxIdlePerHost", default = "default_pool")]
    pub pool_max_idle_per_host: usize,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            user_agent: default_ua(),
            timeout: default_timeout(),
            pool_idle_timeout: default_pool_idle(),
            pool_max_idle_per_host: default_pool(),
        }
    }
}
fn default_ua() -> String {
    "sentitrade/0.1".into()
}
fn default_timeout() -> Duration {
    Duration::from_secs(30)
}
fn default_pool_idle() -> Duration {
    Duration::from_secs(90)
}
fn default_pool() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewsCfg {
    #[serde(default = "default_news_url")]
    pub url: String,
    #[serde(rename = "maxArticles", default = "default_max_articles")]
    pub max_articles: usize,
}

impl Default for NewsCfg {
    fn default() -> Self {
        Self {
            url: default_news_url(),
            max_articles: default_max_articles(),
        }
    }
}
fn default_news_url() -> String {
    "https://saurav.tech/NewsAPI/top-headlines/category/business/in.json".to_string()
}
fn default_max_articles() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmCfg {
    #[serde(rename = "baseUrl", default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(rename = "rateLimitRpm", default = "default_rpm")]
    pub rate_limit_rpm: u32,
}

impl Default for LlmCfg {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key: "".to_string(),
            temperature: default_temperature(),
            rate_limit_rpm: default_rpm(),
        }
    }
}
fn default_llm_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}
fn default_llm_model() -> String {
    "gemini-1.5-pro".to_string()
}
fn default_temperature() -> f32 {
    1.0
}
fn default_rpm() -> u32 {
    2
}

/// Secondary news-sentiment source. `api_keys` is tried in order; the
/// first key is the primary credential, the rest are fallbacks.
#[derive(Debug, Deserialize, Clone)]
pub struct MarketauxCfg {
    #[serde(rename = "baseUrl", default = "default_marketaux_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(rename = "symbolSuffix", default = "default_symbol_suffix")]
    pub symbol_suffix: String,
    #[serde(default = "default_countries")]
    pub countries: String,
    #[serde(rename = "minMatchScore", default = "default_min_match_score")]
    pub min_match_score: u32,
}

impl Default for MarketauxCfg {
    fn default() -> Self {
        Self {
            base_url: default_marketaux_url(),
            api_keys: Vec::new(),
            symbol_suffix: default_symbol_suffix(),
            countries: default_countries(),
            min_match_score: default_min_match_score(),
        }
    }
}
fn default_marketaux_url() -> String {
    "https://api.marketaux.com".to_string()
}
fn default_symbol_suffix() -> String {
    ".BO".to_string()
}
fn default_countries() -> String {
    "in".to_string()
}
fn default_min_match_score() -> u32 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuoteCfg {
    #[serde(rename = "baseUrl", default = "default_quote_url")]
    pub base_url: String,
}

impl Default for QuoteCfg {
    fn default() -> Self {
        Self {
            base_url: default_quote_url(),
        }
    }
}
fn default_quote_url() -> String {
    "http://localhost:8000/quote".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesCfg {
    #[serde(default = "default_universe_path")]
    pub universe: PathBuf,
    #[serde(default = "default_portfolio_path")]
    pub portfolio: PathBuf,
    #[serde(default = "default_transactions_path")]
    pub transactions: PathBuf,
    #[serde(rename = "scripCodes", default = "default_scrip_codes_path")]
    pub scrip_codes: PathBuf,
}

impl Default for FilesCfg {
    fn default() -> Self {
        Self {
            universe: default_universe_path(),
            portfolio: default_portfolio_path(),
            transactions: default_transactions_path(),
            scrip_codes: default_scrip_codes_path(),
        }
    }
}
fn default_universe_path() -> PathBuf {
    PathBuf::from("stocks.json")
}
fn default_portfolio_path() -> PathBuf {
    PathBuf::from("final_stocks.json")
}
fn default_transactions_path() -> PathBuf {
    PathBuf::from("transactions.csv")
}
fn default_scrip_codes_path() -> PathBuf {
    PathBuf::from("stk.json")
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StrategyCfg {
    #[serde(default)]
    pub blend: BlendCfg,
    #[serde(default)]
    pub retry: RetryCfg,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlendCfg {
    #[serde(rename = "secondaryWeight", default = "default_secondary_weight")]
    pub secondary_weight: f64,
    #[serde(rename = "primaryWeight", default = "default_primary_weight")]
    pub primary_weight: f64,
}

impl Default for BlendCfg {
    fn default() -> Self {
        Self {
            secondary_weight: default_secondary_weight(),
            primary_weight: default_primary_weight(),
        }
    }
}
fn default_secondary_weight() -> f64 {
    0.6
}
fn default_primary_weight() -> f64 {
    0.4
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryCfg {
    #[serde(rename = "maxAttempts", default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(
        rename = "initialBackoff",
        with = "humantime_serde",
        default = "default_initial_backoff"
    )]
    pub initial_backoff: Duration,
    #[serde(
        rename = "maxBackoff",
        with = "humantime_serde",
        default = "default_max_backoff"
    )]
    pub max_backoff: Duration,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryCfg {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            multiplier: default_multiplier(),
        }
    }
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_backoff() -> Duration {
    Duration::from_secs(20)
}
fn default_max_backoff() -> Duration {
    Duration::from_secs(160)
}
fn default_multiplier() -> f64 {
    2.0
}

impl AppCfg {
    pub fn load(path: &str) -> Result<Self> {
        let cfg = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("marketaux.api_keys")
                    .try_parsing(true),
            )
            .build()
            .context("building config")?;

        let app: AppCfg = cfg.try_deserialize().context("deserializing config")?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.news.url.is_empty(), "news.url missing");
        anyhow::ensure!(self.news.max_articles > 0, "news.maxArticles must be > 0");
        anyhow::ensure!(!self.llm.base_url.is_empty(), "llm.baseUrl missing");
        anyhow::ensure!(!self.llm.model.is_empty(), "llm.model missing");
        anyhow::ensure!(
            !self.marketaux.base_url.is_empty(),
            "marketaux.baseUrl missing"
        );
        anyhow::ensure!(!self.quotes.base_url.is_empty(), "quotes.baseUrl missing");
        anyhow::ensure!(
            self.strategy.retry.max_attempts > 0,
            "strategy.retry.maxAttempts must be > 0"
        );
        anyhow::ensure!(
            self.strategy.retry.multiplier >= 1.0,
            "strategy.retry.multiplier must be >= 1"
        );
        Ok(())
    }
}
