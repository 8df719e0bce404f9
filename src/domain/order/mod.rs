//! Order domain — working orders keyed by order id.

mod convert;
pub mod wire;

use crate::shared::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange-side lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Open,
    Pending,
    Closed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl OrderState {
    /// Terminal states remove the order from the cache.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Closed | OrderState::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub product_id: Option<u64>,
    pub side: Side,
    pub order_type: Option<String>,
    pub size: Decimal,
    pub unfilled_size: Decimal,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub average_fill_price: Option<Decimal>,
    pub state: OrderState,
    pub created_at: Option<DateTime<Utc>>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Order {
    pub fn filled_size(&self) -> Decimal {
        self.size - self.unfilled_size
    }

    pub fn is_fully_filled(&self) -> bool {
        self.unfilled_size.is_zero()
    }
}

/// What an `orders` frame asks the cache to do.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderUpdate {
    /// Replace the whole cache.
    Snapshot(Vec<Order>),
    Upsert(Order),
    /// Terminal state reached or the exchange deleted the order.
    Remove(Order),
}
