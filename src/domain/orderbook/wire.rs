//! Wire types for L2 orderbook frames.

use crate::shared::serde_util;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// A price level as sent by the exchange: either `["price","size"]`
/// (`l2_updates`) or `{"limit_price":..,"size":..}` (`l2_orderbook`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WireLevel {
    Pair(
        #[serde(with = "serde_util::decimal")] Decimal,
        #[serde(with = "serde_util::decimal")] Decimal,
    ),
    Object {
        #[serde(alias = "limit_price", with = "serde_util::decimal")]
        price: Decimal,
        #[serde(with = "serde_util::decimal")]
        size: Decimal,
    },
}

/// Full-book snapshot (`l2_orderbook`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct L2Orderbook {
    pub symbol: String,
    #[serde(default)]
    pub buy: Vec<WireLevel>,
    #[serde(default)]
    pub sell: Vec<WireLevel>,
    #[serde(default, with = "serde_util::u64_opt")]
    pub last_sequence_no: Option<u64>,
    #[serde(default, with = "serde_util::timestamp_us_opt")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Incremental book frame (`l2_updates`). `action` is `snapshot` for the
/// first frame after subscribing and `update` afterwards.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct L2Update {
    pub symbol: String,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default)]
    pub bids: Vec<WireLevel>,
    #[serde(default)]
    pub asks: Vec<WireLevel>,
    #[serde(default, with = "serde_util::u64_opt")]
    pub sequence_no: Option<u64>,
    #[serde(default, with = "serde_util::u64_opt")]
    pub prev_sequence_no: Option<u64>,
    #[serde(default, rename = "cs", with = "serde_util::string_opt")]
    pub checksum: Option<String>,
    #[serde(default, with = "serde_util::timestamp_us_opt")]
    pub timestamp: Option<DateTime<Utc>>,
}

fn default_action() -> String {
    "update".to_string()
}
