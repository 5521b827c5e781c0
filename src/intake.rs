//! Article intake: the record shape the scrapers hand over, plus the text
//! cleanup applied before classification.
//!
//! Deserialization is tolerant of the scrapers' field names (`pair`,
//! `scraped_at`) and of their loose timestamp formats; a record that can't
//! name an instrument is the source's problem, not ours.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::classify::{Impact, Sentiment};
use crate::instrument::Instrument;

/// One scraped unit, read-only once fetched.
///
/// `sentiment`/`impact` may arrive pre-populated by the fetcher; when
/// present they are trusted as-is and the classifier is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(alias = "pair")]
    pub instrument: Instrument,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub impact: Option<Impact>,
    #[serde(default, alias = "timestamp", deserialize_with = "de_lenient_opt_ts")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(
        default = "Utc::now",
        alias = "scraped_at",
        deserialize_with = "de_lenient_ts_or_now"
    )]
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl Article {
    /// The text the classifier sees: title and summary joined the way the
    /// scrapers join them.
    pub fn text(&self) -> String {
        if self.summary.is_empty() {
            self.title.clone()
        } else {
            format!("{}. {}", self.title, self.summary)
        }
    }
}

/// Clean up scraped text before keyword matching: decode HTML entities,
/// strip tags, collapse whitespace, cap the length.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // Scraped summaries occasionally carry whole pages; 2000 chars is
    // plenty for keyword counting.
    if out.chars().count() > 2000 {
        out = out.chars().take(2000).collect();
    }

    out
}

/// Parse the timestamp formats seen in the scrapers' output: RFC 3339,
/// Python `isoformat()` without offset, and `YYYY-mm-dd HH:MM[:SS]`.
/// Anything else is treated as absent.
pub(crate) fn parse_lenient_ts(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

fn de_lenient_opt_ts<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().and_then(parse_lenient_ts))
}

fn de_lenient_ts_or_now<'de, D>(d: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().and_then(parse_lenient_ts).unwrap_or_else(Utc::now))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_scraper_field_names() {
        let line = r#"{"pair":"GOLDUSD","title":"Gold rallies","summary":"on Fed emergency move",
            "sentiment":"BULLISH","impact":"HIGH","url":"https://example.test/a",
            "timestamp":"2026-08-05T09:30:00","scraped_at":"2026-08-05 09:31:02"}"#;
        let a: Article = serde_json::from_str(line).unwrap();
        assert_eq!(a.instrument, Instrument::GoldUsd);
        assert_eq!(a.sentiment, Some(Sentiment::Bullish));
        assert_eq!(a.impact, Some(Impact::High));
        assert!(a.published_at.is_some());
        assert_eq!(a.fetched_at.to_rfc3339(), "2026-08-05T09:31:02+00:00");
    }

    #[test]
    fn junk_timestamps_become_absent() {
        let line = r#"{"pair":"EURUSD","title":"t","timestamp":"5 hr ago"}"#;
        let a: Article = serde_json::from_str(line).unwrap();
        assert_eq!(a.published_at, None);
        assert_eq!(a.summary, "");
    }

    #[test]
    fn normalize_strips_tags_and_entities() {
        let s = "  <b>Gold&nbsp;rallies</b>   after <a href=\"#\">Fed</a> move ";
        assert_eq!(normalize_text(s), "Gold rallies after Fed move");
    }

    #[test]
    fn text_joins_title_and_summary() {
        let a = Article {
            instrument: Instrument::EurUsd,
            title: "Euro gains".into(),
            summary: "ECB statement due".into(),
            sentiment: None,
            impact: None,
            published_at: None,
            fetched_at: Utc::now(),
            source: None,
            url: None,
        };
        assert_eq!(a.text(), "Euro gains. ECB statement due");
    }
}
