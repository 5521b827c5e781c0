//! Batch aggregator: fold many per-article predictions for one instrument
//! into a single outlook. Pure and tie-break-deterministic; ties always
//! resolve toward the neutral answer.

use serde::{Deserialize, Serialize};

use crate::classify::Sentiment;
use crate::instrument::Instrument;
use crate::predict::{EffectPrediction, Recommendation};

/// Aggregated recommendation and confidence for one instrument over a set
/// of analyzed articles. Recomputed on every query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateOutlook {
    pub instrument: Option<Instrument>,
    pub total_articles: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub hold_signals: usize,
    pub buy_percentage: f32,
    pub sell_percentage: f32,
    pub dominant_sentiment: Sentiment,
    pub avg_confidence: f32,
    pub recommendation: Recommendation,
}

impl AggregateOutlook {
    /// The zero-article outlook: neutral, zero counts, HOLD. Valid, not an
    /// error.
    pub fn empty(instrument: Option<Instrument>) -> Self {
        Self {
            instrument,
            total_articles: 0,
            buy_signals: 0,
            sell_signals: 0,
            hold_signals: 0,
            buy_percentage: 0.0,
            sell_percentage: 0.0,
            dominant_sentiment: Sentiment::Neutral,
            avg_confidence: 0.0,
            recommendation: Recommendation::Hold,
        }
    }
}

/// Combine `(sentiment, prediction)` pairs into one outlook.
///
/// Signal counts come from the per-article recommendations; the final
/// recommendation is BUY/SELL only on a strict signal-count majority.
/// Dominant sentiment is a strict majority over both alternatives, any tie
/// collapses to NEUTRAL.
pub fn aggregate(
    instrument: Option<Instrument>,
    items: &[(Sentiment, EffectPrediction)],
) -> AggregateOutlook {
    if items.is_empty() {
        return AggregateOutlook::empty(instrument);
    }

    let total = items.len();
    let mut buy = 0usize;
    let mut sell = 0usize;
    let mut bullish = 0usize;
    let mut bearish = 0usize;
    let mut neutral = 0usize;
    let mut confidence_sum = 0.0f32;

    for (sentiment, prediction) in items {
        match prediction.recommendation {
            Recommendation::Buy => buy += 1,
            Recommendation::Sell => sell += 1,
            Recommendation::Hold => {}
        }
        match sentiment {
            Sentiment::Bullish => bullish += 1,
            Sentiment::Bearish => bearish += 1,
            Sentiment::Neutral => neutral += 1,
        }
        confidence_sum += prediction.confidence;
    }
    let hold = total - buy - sell;

    let dominant_sentiment = if bullish > bearish && bullish > neutral {
        Sentiment::Bullish
    } else if bearish > bullish && bearish > neutral {
        Sentiment::Bearish
    } else {
        Sentiment::Neutral
    };

    let recommendation = if buy > sell {
        Recommendation::Buy
    } else if sell > buy {
        Recommendation::Sell
    } else {
        Recommendation::Hold
    };

    AggregateOutlook {
        instrument,
        total_articles: total,
        buy_signals: buy,
        sell_signals: sell,
        hold_signals: hold,
        buy_percentage: buy as f32 / total as f32 * 100.0,
        sell_percentage: sell as f32 / total as f32 * 100.0,
        dominant_sentiment,
        avg_confidence: confidence_sum / total as f32,
        recommendation,
    }
}
