//! Position domain — open positions keyed by product symbol.

mod convert;
pub mod wire;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An open position. `size` is signed: negative for shorts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub product_id: Option<u64>,
    pub size: Decimal,
    pub entry_price: Option<Decimal>,
    pub margin: Option<Decimal>,
    pub liquidation_price: Option<Decimal>,
    pub bankruptcy_price: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
    pub realized_funding: Option<Decimal>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.size > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.size < Decimal::ZERO
    }

    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    /// Entry notional, `|size| * entry_price`.
    pub fn notional(&self) -> Option<Decimal> {
        self.entry_price.map(|p| self.size.abs() * p)
    }
}

/// What a `positions` frame asks the cache to do.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionUpdate {
    /// Replace the whole cache.
    Snapshot(Vec<Position>),
    Upsert(Position),
    /// Size went to zero or the exchange deleted the position.
    Remove(Position),
}
