//! Wire types for `all_trades` and `v2/user_trades` frames.

use crate::shared::{serde_util, Role, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Public trade print (`all_trades`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WsTrade {
    pub symbol: String,
    #[serde(default, alias = "id", with = "serde_util::string_opt")]
    pub trade_id: Option<String>,
    #[serde(with = "serde_util::decimal")]
    pub price: Decimal,
    #[serde(with = "serde_util::decimal")]
    pub size: Decimal,
    #[serde(default)]
    pub buyer_role: Option<Role>,
    #[serde(default)]
    pub seller_role: Option<Role>,
    #[serde(default, with = "serde_util::timestamp_us_opt")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Recent-trades backfill sent right after subscribing (`all_trades_snapshot`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WsTradeSnapshot {
    pub symbol: String,
    #[serde(default)]
    pub trades: Vec<SnapshotTrade>,
}

/// Trade entry inside a snapshot; the symbol lives on the enclosing frame.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SnapshotTrade {
    #[serde(with = "serde_util::decimal")]
    pub price: Decimal,
    #[serde(with = "serde_util::decimal")]
    pub size: Decimal,
    #[serde(default)]
    pub buyer_role: Option<Role>,
    #[serde(default)]
    pub seller_role: Option<Role>,
    #[serde(default, with = "serde_util::timestamp_us_opt")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Private fill (`v2/user_trades`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WsUserTrade {
    pub symbol: String,
    #[serde(default, with = "serde_util::string_opt")]
    pub fill_id: Option<String>,
    #[serde(default, with = "serde_util::string_opt")]
    pub order_id: Option<String>,
    #[serde(default, with = "serde_util::string_opt")]
    pub client_order_id: Option<String>,
    pub side: Side,
    #[serde(with = "serde_util::decimal")]
    pub price: Decimal,
    #[serde(with = "serde_util::decimal")]
    pub size: Decimal,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, with = "serde_util::timestamp_us_opt")]
    pub timestamp: Option<DateTime<Utc>>,
}
