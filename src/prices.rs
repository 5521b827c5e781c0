//! Last-known price snapshots per instrument.
//!
//! Informational only: the price refresh job keeps this book current so
//! the query surface can show the latest quote next to an outlook.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::instrument::Instrument;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub instrument: Instrument,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Thread-safe map of the most recent snapshot per instrument.
#[derive(Debug, Default)]
pub struct PriceBook {
    inner: Mutex<HashMap<Instrument, PriceSnapshot>>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the snapshot if it is at least as fresh as the stored one.
    pub fn update(&self, snapshot: PriceSnapshot) {
        let mut map = self.inner.lock().expect("price book mutex poisoned");
        match map.get(&snapshot.instrument) {
            Some(existing) if existing.timestamp > snapshot.timestamp => {}
            _ => {
                map.insert(snapshot.instrument, snapshot);
            }
        }
    }

    pub fn update_all(&self, snapshots: Vec<PriceSnapshot>) {
        for s in snapshots {
            self.update(s);
        }
    }

    pub fn latest(&self, instrument: Instrument) -> Option<PriceSnapshot> {
        self.inner
            .lock()
            .expect("price book mutex poisoned")
            .get(&instrument)
            .cloned()
    }
}
