//! Wire types for `margins` frames.

use crate::shared::serde_util;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WsMargin {
    pub asset_symbol: String,
    #[serde(default, with = "serde_util::u64_opt")]
    pub asset_id: Option<u64>,
    #[serde(with = "serde_util::decimal")]
    pub balance: Decimal,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub available_balance: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub order_margin: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub position_margin: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub commission: Option<Decimal>,
    #[serde(default, with = "serde_util::timestamp_us_opt")]
    pub timestamp: Option<DateTime<Utc>>,
}
