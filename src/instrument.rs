//! Supported tradable instruments: the major currency pairs plus the
//! commodity symbols the scrapers track.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Instrument {
    EurUsd,
    GbpUsd,
    UsdJpy,
    UsdChf,
    AudUsd,
    NzdUsd,
    UsdCad,
    GoldUsd,
    Crude,
    NatGas,
}

impl Instrument {
    pub const ALL: [Instrument; 10] = [
        Instrument::EurUsd,
        Instrument::GbpUsd,
        Instrument::UsdJpy,
        Instrument::UsdChf,
        Instrument::AudUsd,
        Instrument::NzdUsd,
        Instrument::UsdCad,
        Instrument::GoldUsd,
        Instrument::Crude,
        Instrument::NatGas,
    ];

    /// Upper-case symbol as used in stream names and scraper output.
    pub fn symbol(&self) -> &'static str {
        match self {
            Instrument::EurUsd => "EURUSD",
            Instrument::GbpUsd => "GBPUSD",
            Instrument::UsdJpy => "USDJPY",
            Instrument::UsdChf => "USDCHF",
            Instrument::AudUsd => "AUDUSD",
            Instrument::NzdUsd => "NZDUSD",
            Instrument::UsdCad => "USDCAD",
            Instrument::GoldUsd => "GOLDUSD",
            Instrument::Crude => "CRUDE",
            Instrument::NatGas => "NATGAS",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Instrument {
    type Err = UnknownInstrument;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let up = s.trim().to_ascii_uppercase();
        Instrument::ALL
            .into_iter()
            .find(|i| i.symbol() == up)
            .ok_or_else(|| UnknownInstrument(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown instrument `{0}`")]
pub struct UnknownInstrument(pub String);
