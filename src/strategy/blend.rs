use crate::config::config::BlendCfg;
use crate::secondary::client::{SecondaryNews, SecondarySentimentSource};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Mean of the present, non-zero highlight sentiments; 0 when there are none.
pub fn secondary_mean(news: &SecondaryNews) -> f64 {
    let (sum, count) = news
        .highlight_sentiments()
        .fold((0.0, 0u32), |(sum, count), s| (sum + s, count + 1));

    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

pub struct SentimentBlender {
    weights: BlendCfg,
    sources: Vec<Box<dyn SecondarySentimentSource>>,
}

impl SentimentBlender {
    /// `sources` are credentialed endpoints in priority order.
    pub fn new(weights: BlendCfg, sources: Vec<Box<dyn SecondarySentimentSource>>) -> Self {
        Self { weights, sources }
    }

    pub fn blend(&self, secondary: f64, primary: f64) -> f64 {
        self.weights.secondary_weight * secondary + self.weights.primary_weight * primary
    }

    /// Blended sentiment for one stock, or `None` when no endpoint could
    /// supply secondary data.
    pub async fn blend_symbol(&self, symbol: &str, primary: f64) -> Option<f64> {
        for source in &self.sources {
            match source.fetch_news(symbol).await {
                Ok(news) => {
                    let secondary = secondary_mean(&news);
                    let blended = self.blend(secondary, primary);
                    info!(%symbol, endpoint = source.label(), primary, secondary, blended, "sentiment blended");
                    return Some(blended);
                }
                Err(e) => {
                    warn!(%symbol, endpoint = source.label(), error = %e, "secondary sentiment failed, trying next endpoint");
                }
            }
        }

        warn!(%symbol, "no secondary sentiment available, stock excluded");
        metrics::counter!("stocks_unscored_total").increment(1);
        None
    }

    pub async fn blend_all(&self, aggregates: &BTreeMap<String, f64>) -> BTreeMap<String, Option<f64>> {
        let mut out = BTreeMap::new();
        for (symbol, primary) in aggregates {
            let blended = self.blend_symbol(symbol, *primary).await;
            out.insert(symbol.clone(), blended);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::SourceError;
    use crate::secondary::client::{Entity, Highlight, NewsItem};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn news(values: &[Option<f64>]) -> SecondaryNews {
        SecondaryNews {
            data: vec![NewsItem {
                entities: vec![Entity {
                    highlights: values
                        .iter()
                        .map(|v| Highlight {
                            highlight: "h".into(),
                            sentiment: *v,
                        })
                        .collect(),
                }],
            }],
        }
    }

    struct FixedSource {
        label: String,
        reply: Option<Vec<Option<f64>>>,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl SecondarySentimentSource for FixedSource {
        fn label(&self) -> &str {
            &self.label
        }

        async fn fetch_news(&self, _symbol: &str) -> Result<SecondaryNews, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Some(values) => Ok(news(values)),
                None => Err(SourceError::Quota),
            }
        }
    }

    fn source(label: &str, reply: Option<Vec<Option<f64>>>) -> (Box<dyn SecondarySentimentSource>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let src = FixedSource {
            label: label.into(),
            reply,
            calls: calls.clone(),
        };
        (Box::new(src), calls)
    }

    #[test]
    fn test_secondary_mean_ignores_null_and_zero() {
        assert!((secondary_mean(&news(&[Some(0.4), None, Some(0.0), Some(-0.2)])) - 0.1).abs() < 1e-12);
        assert_eq!(secondary_mean(&news(&[None, Some(0.0)])), 0.0);
        assert_eq!(secondary_mean(&SecondaryNews::default()), 0.0);
    }

    #[test]
    fn test_blend_is_order_independent() {
        let a = secondary_mean(&news(&[Some(0.9), Some(-0.3), Some(0.15)]));
        let b = secondary_mean(&news(&[Some(0.15), Some(0.9), Some(-0.3)]));
        assert!((a - b).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_blend_weights() {
        let (primary, _) = source("primary", Some(vec![Some(0.5)]));
        let blender = SentimentBlender::new(BlendCfg::default(), vec![primary]);

        let blended = blender.blend_symbol("TCS", 0.25).await.unwrap();
        // 0.6 * 0.5 + 0.4 * 0.25
        assert!((blended - 0.4).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_falls_back_to_next_endpoint() {
        let (primary, primary_calls) = source("primary", None);
        let (fallback, fallback_calls) = source("fallback", Some(vec![Some(-1.0)]));
        let blender = SentimentBlender::new(BlendCfg::default(), vec![primary, fallback]);

        let blended = blender.blend_symbol("TCS", 0.5).await.unwrap();

        assert!((blended - (-0.4)).abs() < 1e-12);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_endpoints_failing_excludes_stock() {
        let (primary, _) = source("primary", None);
        let (fallback, _) = source("fallback", None);
        let blender = SentimentBlender::new(BlendCfg::default(), vec![primary, fallback]);

        let mut aggregates = BTreeMap::new();
        aggregates.insert("TCS".to_string(), 0.7);
        let out = blender.blend_all(&aggregates).await;

        assert_eq!(out.get("TCS"), Some(&None));
    }
}
