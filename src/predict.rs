//! Effect predictor: deterministic mapping from a classification to a
//! directional probability pair, volatility band, and BUY/SELL/HOLD
//! recommendation with confidence.
//!
//! Tuning lives in the constants below. The recommendation rule is the
//! invariant everything else hangs off: BUY exactly when probability_up
//! exceeds `DECISION_THRESHOLD` and impact is not LOW; symmetric for SELL;
//! otherwise HOLD.

use serde::{Deserialize, Serialize};

use crate::classify::{Impact, Sentiment};

/// Expected price direction for one article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Neutral,
    Volatile,
}

/// Expected volatility band, monotone in impact tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
    Low,
    Medium,
    High,
    VeryHigh,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Recommendation::Buy => "BUY",
            Recommendation::Sell => "SELL",
            Recommendation::Hold => "HOLD",
        })
    }
}

/// A BUY/SELL needs the directional probability to clear this bar.
pub const DECISION_THRESHOLD: f32 = 0.65;

/// probability_up never leaves this band, whatever the shift.
const PROB_FLOOR: f32 = 0.05;
const PROB_CEIL: f32 = 0.95;

/// Shift applied to the 0.5 base probability, up for BULLISH and down for
/// BEARISH, scaled by impact tier.
fn impact_shift(impact: Impact) -> f32 {
    match impact {
        Impact::Low => 0.08,
        Impact::Medium => 0.18,
        Impact::High => 0.30,
    }
}

/// Confidence scaling per impact tier.
fn impact_weight(impact: Impact) -> f32 {
    match impact {
        Impact::Low => 0.6,
        Impact::Medium => 0.8,
        Impact::High => 1.0,
    }
}

/// One article's predicted market effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectPrediction {
    pub direction: Direction,
    pub volatility: Volatility,
    pub probability_up: f32,
    pub probability_down: f32,
    pub recommendation: Recommendation,
    pub confidence: f32,
}

/// Total function over the classifier's output domain; no failure modes.
pub fn predict(sentiment: Sentiment, impact: Impact) -> EffectPrediction {
    let shift = impact_shift(impact);
    let probability_up = match sentiment {
        Sentiment::Bullish => 0.5 + shift,
        Sentiment::Bearish => 0.5 - shift,
        Sentiment::Neutral => 0.5,
    }
    .clamp(PROB_FLOOR, PROB_CEIL);
    let probability_down = 1.0 - probability_up;

    // High impact without a direction reads as "something big, unknown
    // sign": uncertain magnitude, not uncertain existence.
    let volatility = match (impact, sentiment) {
        (Impact::Low, _) => Volatility::Low,
        (Impact::Medium, _) => Volatility::Medium,
        (Impact::High, Sentiment::Neutral) => Volatility::Extreme,
        (Impact::High, _) => Volatility::VeryHigh,
    };

    let direction = if impact == Impact::High && sentiment == Sentiment::Neutral {
        Direction::Volatile
    } else if probability_up > DECISION_THRESHOLD {
        Direction::Up
    } else if probability_down > DECISION_THRESHOLD {
        Direction::Down
    } else {
        Direction::Neutral
    };

    let recommendation = if impact != Impact::Low && probability_up > DECISION_THRESHOLD {
        Recommendation::Buy
    } else if impact != Impact::Low && probability_down > DECISION_THRESHOLD {
        Recommendation::Sell
    } else {
        Recommendation::Hold
    };

    let confidence = (2.0 * (probability_up - 0.5).abs() * impact_weight(impact)).clamp(0.0, 1.0);

    EffectPrediction {
        direction,
        volatility,
        probability_up,
        probability_down,
        recommendation,
        confidence,
    }
}
