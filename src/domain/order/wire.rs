//! Wire types for `orders` frames.

use super::OrderState;
use crate::shared::{serde_util, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WsOrder {
    #[serde(with = "serde_util::string")]
    pub id: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, with = "serde_util::string_opt")]
    pub client_order_id: Option<String>,
    pub symbol: String,
    #[serde(default, with = "serde_util::u64_opt")]
    pub product_id: Option<u64>,
    pub side: Side,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(with = "serde_util::decimal")]
    pub size: Decimal,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub unfilled_size: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub limit_price: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub stop_price: Option<Decimal>,
    #[serde(default, with = "serde_util::decimal_opt")]
    pub average_fill_price: Option<Decimal>,
    pub state: OrderState,
    #[serde(default, with = "serde_util::timestamp_us_opt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "serde_util::timestamp_us_opt")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// `{"action":"snapshot","result":[...]}`, sent right after subscribing.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WsOrderSnapshot {
    pub result: Vec<WsOrder>,
}

/// Either shape of an `orders` frame.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum OrdersFrame {
    Snapshot(WsOrderSnapshot),
    Single(WsOrder),
}
