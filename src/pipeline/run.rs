use crate::config::config::AppCfg;
use crate::core::error::SourceError;
use crate::core::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::core::types::{ScoredArticle, Transaction};
use crate::llm::{LlmClient, SentimentScorer};
use crate::marketdata::bse::BseQuoteClient;
use crate::marketdata::client::QuoteSource;
use crate::news::client::NewsSource;
use crate::news::feed::FeedNewsClient;
use crate::persistence::portfolio_store::PortfolioStore;
use crate::persistence::transaction_log::TransactionLog;
use crate::secondary::client::SecondarySentimentSource;
use crate::secondary::marketaux::MarketauxClient;
use crate::strategy::aggregator::aggregate;
use crate::strategy::allocator::OrderAllocator;
use crate::strategy::blend::SentimentBlender;
use crate::universe::Universe;
use anyhow::{Context, Result};
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{Instrument, info, info_span, warn};

#[derive(Debug, Clone)]
pub struct RunReport {
    pub articles_fetched: usize,
    pub articles_scored: usize,
    pub stocks_scored: usize,
    pub transactions: Vec<Transaction>,
    pub balance: Decimal,
    pub pnl: Decimal,
}

/// One batch: news -> LLM scores -> per-stock mean -> blend -> orders.
/// The portfolio is loaded once before allocation and saved once after.
pub struct TradingRun {
    pub news: Box<dyn NewsSource>,
    pub scorer: Box<dyn SentimentScorer>,
    pub blender: SentimentBlender,
    pub quotes: Box<dyn QuoteSource>,
    pub universe: Universe,
    pub store: PortfolioStore,
    pub log: TransactionLog,
    pub retry: RetryPolicy,
    pub sleeper: Box<dyn Sleeper>,
    pub max_articles: usize,
}

impl TradingRun {
    pub fn from_cfg(cfg: &AppCfg, client: Client) -> Result<Self> {
        let universe = Universe::load(&cfg.files.universe)?;
        info!(stocks = universe.len(), "universe loaded");

        let sources: Vec<Box<dyn SecondarySentimentSource>> =
            MarketauxClient::from_cfg(&cfg.marketaux, &client)
                .into_iter()
                .map(|c| Box::new(c) as Box<dyn SecondarySentimentSource>)
                .collect();
        if sources.is_empty() {
            warn!("no marketaux api keys configured, every stock will be unscored");
        }

        let llm = LlmClient::new(cfg.llm.clone(), client.clone());
        info!(model = llm.model(), "LLM scorer ready");

        Ok(Self {
            news: Box::new(FeedNewsClient::new(cfg.news.clone(), client.clone())),
            scorer: Box::new(llm),
            blender: SentimentBlender::new(cfg.strategy.blend.clone(), sources),
            quotes: Box::new(BseQuoteClient::new(cfg.quotes.clone(), client)),
            universe,
            store: PortfolioStore::new(cfg.files.portfolio.clone()),
            log: TransactionLog::new(cfg.files.transactions.clone()),
            retry: RetryPolicy::from(&cfg.strategy.retry),
            sleeper: Box::new(TokioSleeper),
            max_articles: cfg.news.max_articles,
        })
    }

    /// Fetches the news batch and scores each article. Articles whose
    /// scoring stays quota-limited past the retry budget are skipped.
    pub async fn score_news(&self) -> Result<(usize, Vec<ScoredArticle>)> {
        let articles = self
            .news
            .fetch_articles(self.max_articles)
            .await
            .context("fetching news")?;
        info!(count = articles.len(), "articles to score");

        let mut scored = Vec::with_capacity(articles.len());
        for article in &articles {
            let res = self
                .retry
                .run(self.sleeper.as_ref(), || self.scorer.score(article))
                .await;

            match res {
                Ok(verdict) => {
                    metrics::counter!("articles_scored_total").increment(1);
                    scored.push(verdict);
                }
                Err(e @ SourceError::Unavailable { .. }) => {
                    warn!(title = %article.title, error = %e, "article skipped");
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("scoring article {:?}", article.title));
                }
            }
        }
        Ok((articles.len(), scored))
    }

    pub async fn run(self) -> Result<RunReport> {
        let (articles_fetched, scored) = self
            .score_news()
            .instrument(info_span!("News"))
            .await?;

        let aggregates = aggregate(&self.universe, &scored);
        info!(?aggregates, "per-stock LLM sentiment");

        let blended = self
            .blender
            .blend_all(&aggregates)
            .instrument(info_span!("Blend"))
            .await;
        let stocks_scored = blended.values().filter(|v| v.is_some()).count();

        let mut portfolio = self.store.load()?;
        let allocator = OrderAllocator::new(&self.universe, self.quotes.as_ref());
        let transactions = allocator
            .allocate(&blended, &mut portfolio)
            .instrument(info_span!("Orders"))
            .await?;

        self.store.save(&portfolio)?;
        self.log.append(&transactions)?;

        Ok(RunReport {
            articles_fetched,
            articles_scored: scored.len(),
            stocks_scored,
            transactions,
            balance: portfolio.balance,
            pnl: portfolio.pnl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config::BlendCfg;
    use crate::core::retry::testing::RecordingSleeper;
    use crate::core::types::{Action, Article, ArticleSource, Portfolio, Position, Stock};
    use crate::marketdata::client::Quote;
    use crate::secondary::client::{Entity, Highlight, NewsItem, SecondaryNews};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FixedNews(Vec<Article>);

    #[async_trait]
    impl NewsSource for FixedNews {
        async fn fetch_articles(&self, limit: usize) -> Result<Vec<Article>, SourceError> {
            Ok(crate::news::feed::select_articles(self.0.clone(), limit))
        }
    }

    /// Scores by title; titles listed in `throttled` always hit the quota.
    struct TitleScorer {
        verdicts: HashMap<String, ScoredArticle>,
        throttled: Vec<String>,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl SentimentScorer for TitleScorer {
        async fn score(&self, article: &Article) -> Result<ScoredArticle, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.throttled.contains(&article.title) {
                return Err(SourceError::Quota);
            }
            self.verdicts
                .get(&article.title)
                .cloned()
                .ok_or_else(|| SourceError::Malformed("unexpected article".into()))
        }
    }

    struct FixedSecondary(HashMap<String, f64>);

    #[async_trait]
    impl SecondarySentimentSource for FixedSecondary {
        fn label(&self) -> &str {
            "fixed"
        }

        async fn fetch_news(&self, symbol: &str) -> Result<SecondaryNews, SourceError> {
            let value = self.0.get(symbol).copied().ok_or(SourceError::Quota)?;
            Ok(SecondaryNews {
                data: vec![NewsItem {
                    entities: vec![Entity {
                        highlights: vec![Highlight {
                            highlight: "h".into(),
                            sentiment: Some(value),
                        }],
                    }],
                }],
            })
        }
    }

    struct FixedQuotes(HashMap<String, Decimal>);

    #[async_trait]
    impl QuoteSource for FixedQuotes {
        async fn quote(&self, scrip: &str) -> Result<Quote, SourceError> {
            let price = self
                .0
                .get(scrip)
                .copied()
                .ok_or_else(|| SourceError::InactiveStock(scrip.into()))?;
            Ok(Quote {
                scrip: scrip.into(),
                security_id: scrip.into(),
                current_value: price,
                company_name: None,
            })
        }
    }

    fn article(title: &str, description: Option<&str>) -> Article {
        Article {
            source: ArticleSource {
                name: Some("Business Standard".into()),
            },
            title: title.into(),
            description: description.map(String::from),
        }
    }

    fn verdict(stocks: &[&str], sentiment: f64) -> ScoredArticle {
        ScoredArticle {
            stock: stocks.iter().map(|s| s.to_string()).collect(),
            sentiment,
        }
    }

    struct Harness {
        run: TradingRun,
        dir: tempfile::TempDir,
        calls: Arc<AtomicU32>,
    }

    fn harness(sleeper: Box<dyn Sleeper>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let portfolio = Portfolio {
            balance: Decimal::from(1000),
            pnl: Decimal::ZERO,
            stocks: vec![Position {
                symbol: "WIPRO".into(),
                scrip: "507685".into(),
                qty: 10,
                price: Decimal::from(100),
            }],
        };
        let store = PortfolioStore::new(dir.path().join("final_stocks.json"));
        store.save(&portfolio).unwrap();

        let universe = Universe::new(vec![
            Stock {
                name: "Infosys".into(),
                symbol: "INFY".into(),
                scrip: Some("500209".into()),
            },
            Stock {
                name: "Wipro".into(),
                symbol: "WIPRO".into(),
                scrip: Some("507685".into()),
            },
            Stock {
                name: "Tata Consultancy Services".into(),
                symbol: "TCS".into(),
                scrip: Some("532540".into()),
            },
        ]);

        let calls = Arc::new(AtomicU32::new(0));
        let scorer = TitleScorer {
            verdicts: [
                ("infy wins deal", verdict(&["INFY", "AAPL"], 0.8)),
                ("wipro guidance cut", verdict(&["wipro.ns"], -0.9)),
                ("it sector mixed", verdict(&["Infosys", "WIPRO"], 0.2)),
            ]
            .into_iter()
            .map(|(t, v)| (t.to_string(), v))
            .collect(),
            throttled: vec!["tcs rumour".into()],
            calls: calls.clone(),
        };

        let news = FixedNews(vec![
            article("infy wins deal", Some("large deal")),
            article("no description", None),
            article("wipro guidance cut", Some("weak outlook")),
            article("tcs rumour", Some("unconfirmed")),
            article("it sector mixed", Some("mixed quarter")),
            article("beyond the limit", Some("ignored")),
        ]);

        let secondary = FixedSecondary(
            [("INFY".to_string(), 0.5), ("WIPRO".to_string(), -0.5)]
                .into_iter()
                .collect(),
        );
        let quotes = FixedQuotes(
            [
                ("500209".to_string(), Decimal::from(150)),
                ("507685".to_string(), Decimal::from(120)),
            ]
            .into_iter()
            .collect(),
        );

        let run = TradingRun {
            news: Box::new(news),
            scorer: Box::new(scorer),
            blender: SentimentBlender::new(BlendCfg::default(), vec![Box::new(secondary)]),
            quotes: Box::new(quotes),
            universe,
            store,
            log: TransactionLog::new(dir.path().join("transactions.csv")),
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_secs(20),
                max_backoff: Duration::from_secs(60),
                multiplier: 2.0,
            },
            sleeper,
            max_articles: 5,
        };

        Harness { run, dir, calls }
    }

    #[tokio::test]
    async fn test_full_run_sells_then_buys_and_persists_once() {
        let h = harness(Box::new(RecordingSleeper::default()));
        let portfolio_path = h.dir.path().join("final_stocks.json");
        let log_path = h.dir.path().join("transactions.csv");

        let report = h.run.run().await.unwrap();

        // 5 articles considered, 1 without description, 1 throttled out
        assert_eq!(report.articles_fetched, 4);
        assert_eq!(report.articles_scored, 3);
        // 1 + 3 throttled attempts
        assert_eq!(h.calls.load(Ordering::SeqCst), 6);

        // INFY: primary mean 0.5 -> 0.6*0.5 + 0.4*0.5 = 0.5 (buy)
        // WIPRO: primary mean -0.35 -> 0.6*-0.5 + 0.4*-0.35 = -0.44 (sell)
        assert_eq!(report.stocks_scored, 2);
        assert_eq!(report.transactions.len(), 2);
        assert_eq!(report.transactions[0].action, Action::Sell);
        assert_eq!(report.transactions[0].symbol, "WIPRO");
        assert_eq!(report.transactions[1].action, Action::Buy);
        assert_eq!(report.transactions[1].symbol, "INFY");

        // sell: 1000 + 10*120 = 2200, p/l (100-120)*10 = -200
        // buy: ratio 2200/0.5, budget 2200, 14 shares @150 = 2100
        assert_eq!(report.balance, Decimal::from(100));
        assert_eq!(report.pnl, Decimal::from(-200));
        assert_eq!(report.transactions[1].qty, 14);

        let saved = PortfolioStore::new(&portfolio_path).load().unwrap();
        assert_eq!(saved.balance, Decimal::from(100));
        assert_eq!(saved.stocks.len(), 1);
        assert_eq!(saved.stocks[0].symbol, "INFY");

        let log = fs::read_to_string(&log_path).unwrap();
        assert_eq!(log.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_scoring_backs_off_on_quota() {
        let sleeper = Arc::new(RecordingSleeper::default());

        struct Shared(Arc<RecordingSleeper>);

        #[async_trait]
        impl Sleeper for Shared {
            async fn sleep(&self, delay: Duration) {
                self.0.sleep(delay).await;
            }
        }

        let h = harness(Box::new(Shared(sleeper.clone())));
        let (_, scored) = h.run.score_news().await.unwrap();

        assert_eq!(scored.len(), 3);
        assert_eq!(
            *sleeper.delays.lock().unwrap(),
            vec![Duration::from_secs(20), Duration::from_secs(40)]
        );
    }

    #[tokio::test]
    async fn test_no_scores_leaves_portfolio_unchanged() {
        let mut h = harness(Box::new(RecordingSleeper::default()));
        h.run.blender = SentimentBlender::new(BlendCfg::default(), Vec::new());
        let log_path = h.dir.path().join("transactions.csv");

        let report = h.run.run().await.unwrap();

        assert_eq!(report.stocks_scored, 0);
        assert!(report.transactions.is_empty());
        assert_eq!(report.balance, Decimal::from(1000));
        assert!(!log_path.exists());
    }
}
