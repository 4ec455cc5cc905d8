use crate::core::types::ScoredArticle;
use crate::universe::Universe;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    sum: f64,
    count: u32,
}

/// Running per-stock sentiment over a batch of LLM verdicts. Mentions are
/// matched case-insensitively against the universe and keyed by the
/// canonical universe symbol.
pub struct SentimentAggregator<'a> {
    universe: &'a Universe,
    tallies: BTreeMap<String, Tally>,
}

impl<'a> SentimentAggregator<'a> {
    pub fn new(universe: &'a Universe) -> Self {
        Self {
            universe,
            tallies: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, article: &ScoredArticle) {
        // one vote per stock per article, however many variants it used
        let mut seen = HashSet::new();

        for mention in &article.stock {
            let Some(stock) = self.universe.resolve(mention) else {
                debug!(%mention, "mention outside universe dropped");
                continue;
            };
            if !seen.insert(stock.symbol.as_str()) {
                continue;
            }
            let tally = self.tallies.entry(stock.symbol.clone()).or_default();
            tally.sum += article.sentiment;
            tally.count += 1;
        }
    }

    /// Mean sentiment per stock; stocks never matched are absent.
    pub fn finish(self) -> BTreeMap<String, f64> {
        self.tallies
            .into_iter()
            .map(|(symbol, t)| (symbol, t.sum / f64::from(t.count)))
            .collect()
    }
}

pub fn aggregate(universe: &Universe, articles: &[ScoredArticle]) -> BTreeMap<String, f64> {
    let mut agg = SentimentAggregator::new(universe);
    for article in articles {
        agg.add(article);
    }
    agg.finish()
}
