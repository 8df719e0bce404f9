//! Trade domain — public trades, private fills and their bounded histories.

mod convert;
pub mod state;
pub mod wire;

use crate::shared::{Role, Side};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use state::TradeHistory;

/// A public trade print (`all_trades`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trade {
    pub symbol: String,
    pub trade_id: Option<String>,
    pub price: Decimal,
    pub size: Decimal,
    /// Aggressor side: `Buy` when the buyer was the taker.
    pub side: Side,
    pub buyer_role: Option<Role>,
    pub seller_role: Option<Role>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// One of the account's own executions (`v2/user_trades`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fill {
    pub symbol: String,
    pub fill_id: String,
    pub order_id: Option<String>,
    pub client_order_id: Option<String>,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub role: Option<Role>,
    pub reason: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}
