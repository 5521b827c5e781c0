//! forex-news-analyzer — binary entrypoint.
//!
//! Roles, picked by the first argument:
//!   supervise  (default) run the supervisor owning a scheduler process
//!              and the optional dashboard peer
//!   scheduler  run the job scheduler in this process
//!   once       one analysis pass over the drop directory, printing the
//!              24h outlook per configured instrument

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use forex_news_analyzer::analyzer::Analyzer;
use forex_news_analyzer::config::AppConfig;
use forex_news_analyzer::history::HistoryStore;
use forex_news_analyzer::prices::PriceBook;
use forex_news_analyzer::scheduler::Scheduler;
use forex_news_analyzer::sources::{JsonlDropSource, NewsFeed, NewsSource, PriceSource};
use forex_news_analyzer::supervisor::{PeerSpec, Supervisor, TokioLauncher};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    let role = std::env::args().nth(1).unwrap_or_else(|| "supervise".into());

    match role.as_str() {
        "supervise" => run_supervisor(cfg).await,
        "scheduler" => run_scheduler(cfg).await,
        "once" => run_once(cfg).await,
        other => bail!("unknown role `{other}` (expected supervise | scheduler | once)"),
    }
}

/// Build the analysis stack shared by the scheduler and `once` roles.
fn build_analyzer(cfg: &AppConfig) -> Result<(Arc<Analyzer>, Arc<JsonlDropSource>)> {
    let store = Arc::new(
        HistoryStore::open(&cfg.data_dir)
            .with_context(|| format!("opening history store in {}", cfg.data_dir.display()))?,
    );
    let analyzer = Arc::new(Analyzer::new(cfg.lexicon.clone(), store));
    let source = Arc::new(JsonlDropSource::new(&cfg.data_dir));
    Ok((analyzer, source))
}

async fn run_supervisor(cfg: AppConfig) -> Result<()> {
    let exe = std::env::current_exe().context("locating own executable")?;
    let mut peers = vec![PeerSpec {
        name: "scheduler".into(),
        command: vec![exe.display().to_string(), "scheduler".into()],
    }];
    if let Some(command) = cfg.dashboard_command.clone() {
        peers.push(PeerSpec {
            name: "dashboard".into(),
            command,
        });
    }

    let supervisor = Supervisor::new(TokioLauncher, peers, cfg.restart, cfg.shutdown_grace());
    let code = supervisor
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await;
    std::process::exit(code);
}

async fn run_scheduler(cfg: AppConfig) -> Result<()> {
    let (analyzer, source) = build_analyzer(&cfg)?;
    let price_book = Arc::new(PriceBook::new());

    let scheduler = Scheduler::new(
        &cfg,
        analyzer,
        source.clone(),
        source,
        Arc::clone(&price_book),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupt received");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await
}

async fn run_once(cfg: AppConfig) -> Result<()> {
    let (analyzer, source) = build_analyzer(&cfg)?;

    let price_book = PriceBook::new();
    match source.fetch_snapshots(&cfg.instruments).await {
        Ok(snaps) => price_book.update_all(snaps),
        Err(e) => tracing::warn!(error = %e, "no price snapshots for this pass"),
    }

    for instrument in &cfg.instruments {
        let articles = source
            .fetch_latest(NewsFeed::InstrumentNews(*instrument))
            .await?;
        analyzer.ingest(&articles);

        let outlook = analyzer.analyze_pair(*instrument, chrono::Duration::hours(24));
        let quote = price_book
            .latest(*instrument)
            .map(|s| format!("{:.4}", s.price))
            .unwrap_or_else(|| "-".into());
        println!(
            "{instrument} @ {quote}: {} (conf={:.2}) -- {} articles, {} buy / {} sell / {} hold",
            outlook.recommendation,
            outlook.avg_confidence,
            outlook.total_articles,
            outlook.buy_signals,
            outlook.sell_signals,
            outlook.hold_signals,
        );
    }
    Ok(())
}
