//! Lexicon classifier: free text → (sentiment, impact) by counting
//! case-insensitive keyword matches against fixed keyword sets.
//!
//! The keyword sets ship as an embedded JSON asset and live inside the
//! immutable app configuration; nothing here reads ambient globals.

use serde::{Deserialize, Serialize};

/// Coarse directional tone of a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

/// Coarse severity tier of a news item. Ordered: Low < Medium < High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// HIGH needs at least two high-impact hits; MEDIUM needs one medium hit.
const HIGH_IMPACT_MIN_HITS: usize = 2;
const MEDIUM_IMPACT_MIN_HITS: usize = 1;

/// The four fixed keyword sets. Loaded once at startup and passed
/// explicitly to everything that classifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lexicon {
    pub bullish: Vec<String>,
    pub bearish: Vec<String>,
    pub high_impact: Vec<String>,
    pub medium_impact: Vec<String>,
}

impl Lexicon {
    /// The built-in keyword sets shipped with the crate.
    pub fn builtin() -> Self {
        let raw = include_str!("../config/lexicon.json");
        serde_json::from_str(raw).expect("valid built-in lexicon")
    }

    /// Classify a text into (sentiment, impact).
    ///
    /// Sentiment: whichever of the bullish/bearish sets has strictly more
    /// matches; equal counts mean NEUTRAL. Impact: HIGH on two or more
    /// high-impact hits, else MEDIUM on at least one medium hit, else LOW.
    /// Empty or whitespace text degrades to (NEUTRAL, LOW) without failing.
    pub fn classify(&self, text: &str) -> (Sentiment, Impact) {
        if text.trim().is_empty() {
            tracing::debug!("empty article text, degraded to neutral/low");
            return (Sentiment::Neutral, Impact::Low);
        }

        let haystack = text.to_lowercase();

        let bullish = count_hits(&haystack, &self.bullish);
        let bearish = count_hits(&haystack, &self.bearish);
        let sentiment = if bullish > bearish {
            Sentiment::Bullish
        } else if bearish > bullish {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        };

        let high = count_hits(&haystack, &self.high_impact);
        let medium = count_hits(&haystack, &self.medium_impact);
        let impact = if high >= HIGH_IMPACT_MIN_HITS {
            Impact::High
        } else if medium >= MEDIUM_IMPACT_MIN_HITS {
            Impact::Medium
        } else {
            Impact::Low
        };

        (sentiment, impact)
    }
}

/// Number of keywords that occur in the (already lower-cased) haystack.
/// Substring containment, so multi-word phrases like "break higher" count.
fn count_hits(haystack: &str, keywords: &[String]) -> usize {
    keywords.iter().filter(|kw| haystack.contains(kw.as_str())).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_neutral_low() {
        let lex = Lexicon::builtin();
        assert_eq!(lex.classify(""), (Sentiment::Neutral, Impact::Low));
        assert_eq!(lex.classify("   \t\n"), (Sentiment::Neutral, Impact::Low));
    }

    #[test]
    fn fed_emergency_rate_cut_rally_is_bullish_high() {
        let lex = Lexicon::builtin();
        let (s, i) = lex.classify("Fed emergency rate cut triggers rally");
        assert_eq!(s, Sentiment::Bullish); // "rally"
        assert_eq!(i, Impact::High); // "fed" + "emergency"
    }

    #[test]
    fn bearish_beats_bullish_on_count() {
        let lex = Lexicon::builtin();
        let (s, _) = lex.classify("Stocks plunge as weak data fuels recession concern");
        assert_eq!(s, Sentiment::Bearish);
    }

    #[test]
    fn equal_counts_are_neutral() {
        let lex = Lexicon::builtin();
        // one bullish ("rally"), one bearish ("drop")
        let (s, _) = lex.classify("rally fades into a drop");
        assert_eq!(s, Sentiment::Neutral);
    }

    #[test]
    fn single_medium_hit_is_medium_impact() {
        let lex = Lexicon::builtin();
        let (_, i) = lex.classify("quarterly report due next week");
        assert_eq!(i, Impact::Medium);
    }

    #[test]
    fn matching_ignores_case() {
        let lex = Lexicon::builtin();
        let (s, i) = lex.classify("RALLY AFTER FED EMERGENCY MEETING");
        assert_eq!(s, Sentiment::Bullish);
        assert_eq!(i, Impact::High);
    }
}
