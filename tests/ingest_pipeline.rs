// tests/ingest_pipeline.rs
//
// Drop file → JSONL source → analyzer → history stream, end to end.

use std::io::Write;
use std::sync::Arc;

use forex_news_analyzer::analyzer::Analyzer;
use forex_news_analyzer::classify::Lexicon;
use forex_news_analyzer::history::HistoryStore;
use forex_news_analyzer::instrument::Instrument;
use forex_news_analyzer::predict::Recommendation;
use forex_news_analyzer::sources::{JsonlDropSource, NewsFeed, NewsSource};

#[tokio::test]
async fn drop_file_flows_into_a_windowed_outlook() {
    let tmp = tempfile::tempdir().unwrap();

    // what the market-news scraper would have written
    let drop_path = tmp.path().join("market_news_goldusd.jsonl");
    let mut f = std::fs::File::create(&drop_path).unwrap();
    writeln!(
        f,
        r#"{{"pair":"GOLDUSD","title":"Fed emergency rate cut triggers rally","url":"https://x/1"}}"#
    )
    .unwrap();
    writeln!(
        f,
        r#"{{"pair":"GOLDUSD","title":"Gold surge continues, strong breaking FOMC news","url":"https://x/2"}}"#
    )
    .unwrap();
    writeln!(f, "{{torn line").unwrap();

    let source = JsonlDropSource::new(tmp.path());
    let articles = source
        .fetch_latest(NewsFeed::InstrumentNews(Instrument::GoldUsd))
        .await
        .unwrap();
    assert_eq!(articles.len(), 2, "torn line must be skipped");

    let store = Arc::new(HistoryStore::open(tmp.path().join("history")).unwrap());
    let analyzer = Analyzer::new(Lexicon::builtin(), Arc::clone(&store));

    let summary = analyzer.ingest(&articles);
    assert_eq!(summary.analyzed, 2);
    assert_eq!(summary.persisted, 2);

    let outlook = analyzer.analyze_pair(Instrument::GoldUsd, chrono::Duration::hours(24));
    assert_eq!(outlook.total_articles, 2);
    assert_eq!(outlook.recommendation, Recommendation::Buy);

    // the history stream is durable: a fresh store sees both records
    let reopened = HistoryStore::open(tmp.path().join("history")).unwrap();
    assert_eq!(reopened.len(), 2);
    let latest = reopened.latest(Instrument::GoldUsd, 1);
    assert_eq!(latest[0].title, "Gold surge continues, strong breaking FOMC news");
}
