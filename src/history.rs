//! Append-only analysis history: one JSONL stream per instrument on disk
//! plus an in-memory insertion-ordered index that answers queries.
//!
//! Appends are a single buffered line write under the store lock, so a
//! record is either fully on disk or not there at all; a write failure
//! keeps the record in memory and is reported as a recoverable
//! `PersistenceError`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::{Impact, Sentiment};
use crate::error::PersistenceError;
use crate::instrument::Instrument;
use crate::predict::EffectPrediction;

/// The persisted unit: one analyzed article. Never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub instrument: Instrument,
    pub title: String,
    pub sentiment: Sentiment,
    pub impact: Impact,
    pub prediction: EffectPrediction,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug)]
pub struct HistoryStore {
    dir: PathBuf,
    inner: Mutex<Vec<HistoryRecord>>,
}

impl HistoryStore {
    /// Open the store in `dir`, creating it if needed and loading any
    /// existing streams. Malformed or partially-written trailing lines are
    /// skipped, so a reader never chokes on a stream that grew mid-write.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let mut records = Vec::new();
        for instrument in Instrument::ALL {
            let path = stream_path(&dir, instrument);
            if !path.exists() {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            let mut skipped = 0usize;
            for line in content.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<HistoryRecord>(line) {
                    Ok(r) => records.push(r),
                    Err(_) => skipped += 1,
                }
            }
            if skipped > 0 {
                tracing::warn!(
                    stream = %path.display(),
                    skipped,
                    "skipped unreadable history lines"
                );
            }
        }

        Ok(Self {
            dir,
            inner: Mutex::new(records),
        })
    }

    /// Durable append. The record always lands in the in-memory index;
    /// the error only reports that the disk copy is missing.
    pub fn append(&self, record: HistoryRecord) -> Result<(), PersistenceError> {
        let mut line = match serde_json::to_vec(&record) {
            Ok(l) => l,
            Err(e) => {
                // keep the in-memory copy even when encoding fails
                self.inner
                    .lock()
                    .expect("history mutex poisoned")
                    .push(record);
                return Err(PersistenceError::Encode(e));
            }
        };
        line.push(b'\n');

        let path = stream_path(&self.dir, record.instrument);
        let mut v = self.inner.lock().expect("history mutex poisoned");
        v.push(record);

        // One write call per record: concurrent appenders are serialized by
        // the lock above, so lines never interleave.
        let res = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| f.write_all(&line));
        res.map_err(PersistenceError::Io)
    }

    /// Records for `instrument` with `timestamp >= since`, in original
    /// insertion order. Side-effect-free and restartable.
    pub fn query(&self, instrument: Instrument, since: DateTime<Utc>) -> Vec<HistoryRecord> {
        let v = self.inner.lock().expect("history mutex poisoned");
        v.iter()
            .filter(|r| r.instrument == instrument && r.timestamp >= since)
            .cloned()
            .collect()
    }

    /// Most recent records for `instrument`, newest first.
    pub fn latest(&self, instrument: Instrument, limit: usize) -> Vec<HistoryRecord> {
        let v = self.inner.lock().expect("history mutex poisoned");
        v.iter()
            .rev()
            .filter(|r| r.instrument == instrument)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("history mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// On-disk path of one instrument's stream.
    pub fn stream_path_for(&self, instrument: Instrument) -> PathBuf {
        stream_path(&self.dir, instrument)
    }
}

fn stream_path(dir: &Path, instrument: Instrument) -> PathBuf {
    dir.join(format!(
        "news_analysis_{}.jsonl",
        instrument.symbol().to_ascii_lowercase()
    ))
}
