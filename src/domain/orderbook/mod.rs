//! Orderbook domain — price levels, L2 frames, reconciled book state.

mod convert;
pub mod state;
pub mod wire;

pub use state::{ApplyOutcome, OrderbookState};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single (price, size) level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Which side of the book a traversal consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSide {
    Bid,
    Ask,
}

/// Whether a frame replaces the book or merges into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookAction {
    Snapshot,
    Update,
}

/// A normalized L2 frame, produced from either `l2_orderbook` or `l2_updates`.
#[derive(Debug, Clone, PartialEq)]
pub struct BookFrame {
    pub symbol: String,
    pub action: BookAction,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub sequence_no: Option<u64>,
    pub prev_sequence_no: Option<u64>,
    pub checksum: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}
