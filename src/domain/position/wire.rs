//! Wire types for `positions` frames.

use crate::shared::serde_util;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WsPosition {
    pub symbol: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, with = "serde_util::u64_opt")]
    pub product_id: Option<u64>,
    #[serde(with = "serde_util::decimal")]
    pub size: Decimal,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub entry_price: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub margin: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub liquidation_price: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub bankruptcy_price: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub realized_pnl: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub realized_funding: Option<Decimal>,
    #[serde(default, with = "serde_util::timestamp_us_opt")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// `{"action":"snapshot","result":[...]}`, sent right after subscribing.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WsPositionSnapshot {
    pub result: Vec<WsPosition>,
}

/// Either shape of a `positions` frame.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PositionsFrame {
    Snapshot(WsPositionSnapshot),
    Single(WsPosition),
}
