//! The external-collaborator seam: where articles and prices come from.
//!
//! Acquisition itself (crawlers, HTTP) lives outside this crate; the
//! scheduler only talks to these traits. `JsonlDropSource` is the default
//! implementation, consuming the JSONL drop files the scrapers write.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::FetchError;
use crate::instrument::Instrument;
use crate::intake::Article;
use crate::prices::PriceSnapshot;

/// Which feed a news job is refreshing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewsFeed {
    EconomicCalendar,
    GeneralNews,
    InstrumentNews(Instrument),
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch_latest(&self, feed: NewsFeed) -> Result<Vec<Article>, FetchError>;
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_snapshots(
        &self,
        instruments: &[Instrument],
    ) -> Result<Vec<PriceSnapshot>, FetchError>;
    fn name(&self) -> &'static str;
}

/// Reads the newest matching JSONL drop file for a feed from the data
/// directory. No files is a valid empty fetch, not an error; unreadable
/// lines are skipped with a debug log.
#[derive(Debug, Clone)]
pub struct JsonlDropSource {
    dir: PathBuf,
}

impl JsonlDropSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn feed_prefixes(feed: NewsFeed) -> Vec<String> {
        match feed {
            NewsFeed::EconomicCalendar => {
                vec!["economic_calendar".into(), "calendar".into()]
            }
            NewsFeed::GeneralNews => {
                vec!["news_latest".into(), "reuters_news".into(), "news".into()]
            }
            NewsFeed::InstrumentNews(i) => {
                vec![format!("market_news_{}", i.symbol().to_ascii_lowercase())]
            }
        }
    }

    /// Newest file in the drop dir whose name starts with one of the
    /// prefixes and ends in `.jsonl`.
    fn newest_matching(&self, prefixes: &[String]) -> Result<Option<PathBuf>, std::io::Error> {
        if !self.dir.is_dir() {
            return Ok(None);
        }
        let mut best: Option<(std::time::SystemTime, PathBuf)> = None;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !is_match(&path, prefixes) {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            if best.as_ref().map_or(true, |(t, _)| modified > *t) {
                best = Some((modified, path));
            }
        }
        Ok(best.map(|(_, p)| p))
    }

    fn read_articles(&self, path: &Path) -> Result<Vec<Article>, FetchError> {
        let content = fs::read_to_string(path)?;
        let mut articles = Vec::new();
        let mut skipped = 0usize;
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Article>(line) {
                Ok(a) => articles.push(a),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!(file = %path.display(), skipped, "skipped unreadable intake lines");
        }
        Ok(articles)
    }
}

fn is_match(path: &Path, prefixes: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    // our own history streams live in the same directory; never re-ingest them
    if name.starts_with("news_analysis") {
        return false;
    }
    name.ends_with(".jsonl") && prefixes.iter().any(|p| name.starts_with(p.as_str()))
}

#[async_trait]
impl NewsSource for JsonlDropSource {
    async fn fetch_latest(&self, feed: NewsFeed) -> Result<Vec<Article>, FetchError> {
        let Some(path) = self.newest_matching(&Self::feed_prefixes(feed))? else {
            return Ok(Vec::new());
        };
        let mut articles = self.read_articles(&path)?;

        if let NewsFeed::InstrumentNews(instrument) = feed {
            // the drop file can carry strays from other pages; keep the
            // requested instrument only and drop url/title duplicates
            let mut seen = std::collections::HashSet::new();
            articles.retain(|a| {
                a.instrument == instrument && seen.insert((a.url.clone(), a.title.clone()))
            });
        }
        Ok(articles)
    }

    fn name(&self) -> &'static str {
        "jsonl-drop"
    }
}

#[async_trait]
impl PriceSource for JsonlDropSource {
    async fn fetch_snapshots(
        &self,
        instruments: &[Instrument],
    ) -> Result<Vec<PriceSnapshot>, FetchError> {
        let Some(path) = self.newest_matching(&["prices".to_string()])? else {
            return Ok(Vec::new());
        };
        let content = fs::read_to_string(&path)?;
        let mut snaps = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(s) = serde_json::from_str::<PriceSnapshot>(line) {
                if instruments.contains(&s.instrument) {
                    snaps.push(s);
                }
            }
        }
        Ok(snaps)
    }

    fn name(&self) -> &'static str {
        "jsonl-drop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, lines: &[&str]) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        for l in lines {
            writeln!(f, "{l}").unwrap();
        }
    }

    #[tokio::test]
    async fn missing_drop_dir_is_an_empty_fetch() {
        let src = JsonlDropSource::new("/nonexistent/drop/dir");
        let out = src.fetch_latest(NewsFeed::GeneralNews).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn instrument_feed_filters_and_dedups() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(
            tmp.path(),
            "market_news_goldusd.jsonl",
            &[
                r#"{"pair":"GOLDUSD","title":"Gold rallies","url":"https://x/a"}"#,
                r#"{"pair":"GOLDUSD","title":"Gold rallies","url":"https://x/a"}"#,
                r#"{"pair":"EURUSD","title":"stray","url":"https://x/b"}"#,
                r#"not json at all"#,
            ],
        );
        let src = JsonlDropSource::new(tmp.path());
        let out = src
            .fetch_latest(NewsFeed::InstrumentNews(Instrument::GoldUsd))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].title, "Gold rallies");
    }

    #[tokio::test]
    async fn history_streams_are_never_re_ingested() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(
            tmp.path(),
            "news_analysis_goldusd.jsonl",
            &[r#"{"pair":"GOLDUSD","title":"old analysis","sentiment":"BULLISH","impact":"HIGH"}"#],
        );
        let src = JsonlDropSource::new(tmp.path());
        let out = src.fetch_latest(NewsFeed::GeneralNews).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn price_lines_are_filtered_to_requested_instruments() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(
            tmp.path(),
            "prices_latest.jsonl",
            &[
                r#"{"instrument":"EURUSD","price":1.09,"timestamp":"2026-08-05T10:00:00Z"}"#,
                r#"{"instrument":"CRUDE","price":71.4,"timestamp":"2026-08-05T10:00:00Z"}"#,
            ],
        );
        let src = JsonlDropSource::new(tmp.path());
        let snaps = src.fetch_snapshots(&[Instrument::EurUsd]).await.unwrap();
        assert_eq!(snaps.len(), 1);
        assert_eq!(snaps[0].instrument, Instrument::EurUsd);
    }
}
