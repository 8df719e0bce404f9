//! Ticker domain — last price, 24h statistics and top of book per symbol.

mod convert;
pub mod wire;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest ticker for a symbol. Each inbound ticker replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub product_id: Option<u64>,
    pub last_price: Decimal,
    pub open: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub turnover: Option<Decimal>,
    /// Absolute change of the last price over 24h.
    pub change_24h: Option<Decimal>,
    /// 24h change in percent.
    pub change_24h_pct: Option<Decimal>,
    pub mark_price: Option<Decimal>,
    pub spot_price: Option<Decimal>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub bid_size: Option<Decimal>,
    pub ask_size: Option<Decimal>,
    pub open_interest: Option<Decimal>,
    pub funding_rate: Option<Decimal>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Ticker {
    /// Midpoint of the quoted best bid/ask.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }
}
