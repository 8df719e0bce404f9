//! Wire types for `v2/ticker` frames.

use crate::shared::serde_util;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Top-of-book quote block nested in a ticker frame.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TickerQuotes {
    #[serde(default, with = "serde_util::decimal_opt")]
    pub best_bid: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub best_ask: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub bid_size: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub ask_size: Option<Decimal>,
}

/// Raw ticker frame (`v2/ticker`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TickerFrame {
    pub symbol: String,
    #[serde(default, with = "serde_util::u64_opt")]
    pub product_id: Option<u64>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub close: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub open: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub high: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub low: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub volume: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub turnover: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub mark_price: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub spot_price: Option<Decimal>,
    /// 24h change in percent as reported by the exchange.
    #[serde(default, with = "serde_util::decimal_opt")]
    pub ltp_change_24h: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub oi: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub funding_rate: Option<Decimal>,
    #[serde(default)]
    pub quotes: Option<TickerQuotes>,
    #[serde(default, with = "serde_util::timestamp_us_opt")]
    pub timestamp: Option<DateTime<Utc>>,
}
