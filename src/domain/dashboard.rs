//! Dashboard Data
//!
//! Types for the cached market data shown next to the trading controls:
//! sentiment headlines, technical and blockchain indicators, and price ticks.

use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Longest headline title displayed in the headlines table
pub const MAX_HEADLINE_LENGTH: usize = 35;

/// Truncate `text` to at most `len` characters
pub fn trim_if_longer_than(text: &str, len: usize) -> String {
    match text.char_indices().nth(len) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Raw table as written by the data refresh job: `{name, data: [[...], ...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTable {
    pub name: String,
    pub data: Vec<Vec<String>>,
}

/// One sentiment-scored headline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub date: String,
    pub title: String,
    pub sentiment: String,
}

/// Technical indicator with its trading signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechnicalIndicator {
    pub name: String,
    pub value: String,
    pub signal: String,
}

/// On-chain network statistic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockchainIndicator {
    pub name: String,
    pub value: String,
}

impl DataTable {
    /// Headline rows with titles trimmed for display; short rows are skipped
    pub fn headlines(&self) -> Vec<Headline> {
        self.data
            .iter()
            .filter_map(|row| match row.as_slice() {
                [date, title, sentiment, ..] => Some(Headline {
                    date: date.clone(),
                    title: trim_if_longer_than(title, MAX_HEADLINE_LENGTH),
                    sentiment: sentiment.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn technical_indicators(&self) -> Vec<TechnicalIndicator> {
        self.data
            .iter()
            .filter_map(|row| match row.as_slice() {
                [name, value, signal, ..] => Some(TechnicalIndicator {
                    name: name.clone(),
                    value: value.clone(),
                    signal: signal.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn blockchain_indicators(&self) -> Vec<BlockchainIndicator> {
        self.data
            .iter()
            .filter_map(|row| match row.as_slice() {
                [name, value, ..] => Some(BlockchainIndicator {
                    name: name.clone(),
                    value: value.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Ticker snapshot. The refresh job writes most numbers as strings,
/// so every numeric field accepts either form.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriceTick {
    #[serde(deserialize_with = "flexible_decimal")]
    pub last: Decimal,
    #[serde(deserialize_with = "flexible_decimal")]
    pub high: Decimal,
    #[serde(deserialize_with = "flexible_decimal")]
    pub low: Decimal,
    #[serde(deserialize_with = "flexible_decimal")]
    pub open: Decimal,
    #[serde(deserialize_with = "flexible_decimal")]
    pub volume: Decimal,
    #[serde(deserialize_with = "flexible_i64")]
    pub timestamp: i64,
}

/// Price cache file: `{fetching, data: [tick, ...]}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PriceData {
    #[serde(default)]
    pub fetching: bool,
    pub data: Vec<PriceTick>,
}

impl PriceData {
    /// Most recent tick by timestamp
    pub fn latest(&self) -> Option<&PriceTick> {
        self.data.iter().max_by_key(|t| t.timestamp)
    }
}

/// Everything the dashboard tables display after one refresh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardSnapshot {
    pub headlines: Vec<Headline>,
    pub technical: Vec<TechnicalIndicator>,
    pub blockchain: Vec<BlockchainIndicator>,
    pub prices: PriceData,
    /// Unix seconds of the refresh that produced this snapshot
    pub refreshed_at: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Str(String),
    Num(serde_json::Number),
}

impl StringOrNumber {
    fn text(self) -> String {
        match self {
            StringOrNumber::Str(s) => s,
            StringOrNumber::Num(n) => n.to_string(),
        }
    }
}

pub(crate) fn flexible_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = StringOrNumber::deserialize(deserializer)?.text();
    Decimal::from_str(raw.trim())
        .or_else(|_| Decimal::from_scientific(raw.trim()))
        .map_err(|e| de::Error::custom(format!("invalid decimal '{}': {}", raw, e)))
}

fn flexible_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = StringOrNumber::deserialize(deserializer)?.text();
    raw.trim()
        .parse::<i64>()
        .map_err(|e| de::Error::custom(format!("invalid integer '{}': {}", raw, e)))
}
