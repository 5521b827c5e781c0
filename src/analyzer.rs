//! Analysis facade: classification → prediction → history append for
//! ingestion, plus the side-effect-free query surface.

use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::aggregate::{aggregate, AggregateOutlook};
use crate::classify::{Impact, Lexicon, Sentiment};
use crate::history::{HistoryRecord, HistoryStore};
use crate::instrument::Instrument;
use crate::intake::{normalize_text, Article};
use crate::predict::{predict, EffectPrediction};

/// One-time metrics registration (so series carry descriptions).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("analyzer_articles_total", "Articles run through the pipeline.");
        describe_counter!(
            "analyzer_append_failures_total",
            "History appends that fell back to in-memory only."
        );
    });
}

/// Result of one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub analyzed: usize,
    pub persisted: usize,
    pub append_failures: usize,
}

pub struct Analyzer {
    lexicon: Lexicon,
    store: Arc<HistoryStore>,
}

impl Analyzer {
    pub fn new(lexicon: Lexicon, store: Arc<HistoryStore>) -> Self {
        ensure_metrics_described();
        Self { lexicon, store }
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    /// Sentiment/impact for an article: fetcher-populated hints are
    /// trusted as-is; whatever is missing is computed from the text.
    fn classification_of(&self, article: &Article) -> (Sentiment, Impact) {
        match (article.sentiment, article.impact) {
            (Some(s), Some(i)) => (s, i),
            (hint_s, hint_i) => {
                let (s, i) = self.lexicon.classify(&normalize_text(&article.text()));
                (hint_s.unwrap_or(s), hint_i.unwrap_or(i))
            }
        }
    }

    /// Predict one article's market effect. Side-effect-free.
    pub fn analyze_article(&self, article: &Article) -> EffectPrediction {
        let (sentiment, impact) = self.classification_of(article);
        predict(sentiment, impact)
    }

    /// Aggregate a batch of articles into one outlook. Side-effect-free;
    /// the instrument is taken from the first article when present.
    pub fn analyze_batch(&self, articles: &[Article]) -> AggregateOutlook {
        let items: Vec<(Sentiment, EffectPrediction)> = articles
            .iter()
            .map(|a| {
                let (s, i) = self.classification_of(a);
                (s, predict(s, i))
            })
            .collect();
        aggregate(articles.first().map(|a| a.instrument), &items)
    }

    /// Run articles through classify → predict → append, in that order per
    /// article. A failed append is logged, counted, and never stops the
    /// pass; the record stays queryable in memory.
    pub fn ingest(&self, articles: &[Article]) -> IngestSummary {
        let mut summary = IngestSummary::default();
        for article in articles {
            let (sentiment, impact) = self.classification_of(article);
            let prediction = predict(sentiment, impact);
            let record = HistoryRecord {
                instrument: article.instrument,
                title: article.title.clone(),
                sentiment,
                impact,
                prediction,
                timestamp: Utc::now(),
                url: article.url.clone(),
            };

            summary.analyzed += 1;
            counter!("analyzer_articles_total").increment(1);
            match self.store.append(record) {
                Ok(()) => summary.persisted += 1,
                Err(e) => {
                    summary.append_failures += 1;
                    counter!("analyzer_append_failures_total").increment(1);
                    warn!(
                        instrument = %article.instrument,
                        error = %e,
                        "history append failed, continuing with in-memory record"
                    );
                }
            }
        }
        debug!(
            analyzed = summary.analyzed,
            persisted = summary.persisted,
            "ingest pass done"
        );
        summary
    }

    /// Windowed outlook for one instrument from the history store. An
    /// empty window is a valid neutral outcome.
    pub fn analyze_pair(&self, instrument: Instrument, window: Duration) -> AggregateOutlook {
        let since = Utc::now() - window;
        let items: Vec<(Sentiment, EffectPrediction)> = self
            .store
            .query(instrument, since)
            .into_iter()
            .map(|r| (r.sentiment, r.prediction))
            .collect();
        aggregate(Some(instrument), &items)
    }

    /// Most recently analyzed articles for an instrument, newest first.
    pub fn latest(&self, instrument: Instrument, limit: usize) -> Vec<HistoryRecord> {
        self.store.latest(instrument, limit)
    }
}
