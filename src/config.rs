//! Process-wide immutable configuration: instrument set, job table,
//! lexicons, timeouts, restart policy. Built from compiled defaults and
//! optionally overridden by a TOML file; loaded once at startup and passed
//! explicitly to every component that needs it.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::classify::Lexicon;
use crate::instrument::Instrument;

pub const ENV_CONFIG_PATH: &str = "ANALYZER_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/analyzer.toml";

/// Refresh intervals of the static job table, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobIntervals {
    pub calendar_secs: u64,
    pub news_secs: u64,
    pub instrument_news_secs: u64,
    pub prices_secs: u64,
}

impl Default for JobIntervals {
    fn default() -> Self {
        Self {
            calendar_secs: 30 * 60,
            news_secs: 15 * 60,
            instrument_news_secs: 10 * 60,
            prices_secs: 5 * 60,
        }
    }
}

/// Bounded-restart policy for supervised peers: at most `max_restarts`
/// within a sliding `window_secs`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RestartPolicy {
    pub max_restarts: u32,
    pub window_secs: u64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 3,
            window_secs: 60,
        }
    }
}

impl RestartPolicy {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Instruments the per-instrument news job and price job cover.
    pub instruments: Vec<Instrument>,
    /// Where the scrapers drop files and where history streams live.
    pub data_dir: PathBuf,
    pub jobs: JobIntervals,
    /// A fetch exceeding this is a job failure, not a hang.
    pub fetch_timeout_secs: u64,
    pub restart: RestartPolicy,
    /// How long peers get to stop on shutdown before being killed.
    pub shutdown_grace_secs: u64,
    /// Optional dashboard/UI peer command line, argv style.
    pub dashboard_command: Option<Vec<String>>,
    pub lexicon: Lexicon,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            instruments: Instrument::ALL.to_vec(),
            data_dir: PathBuf::from("data"),
            jobs: JobIntervals::default(),
            fetch_timeout_secs: 120,
            restart: RestartPolicy::default(),
            shutdown_grace_secs: 5,
            dashboard_command: None,
            lexicon: Lexicon::builtin(),
        }
    }
}

impl AppConfig {
    /// Load configuration:
    /// 1) $ANALYZER_CONFIG_PATH (must exist when set)
    /// 2) config/analyzer.toml
    /// 3) compiled defaults
    pub fn load() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(&p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path {p}"));
            }
            return Self::load_from(&pb);
        }
        let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Self::load_from(&fallback);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&content)
            .with_context(|| format!("parsing config from {}", path.display()))?;
        Ok(cfg)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}
