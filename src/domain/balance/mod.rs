//! Balance domain — wallet margins keyed by asset symbol.

mod convert;
pub mod wire;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Wallet balance for one asset. Each update replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset_symbol: String,
    pub asset_id: Option<u64>,
    pub balance: Decimal,
    pub available_balance: Option<Decimal>,
    pub order_margin: Option<Decimal>,
    pub position_margin: Option<Decimal>,
    pub commission: Option<Decimal>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Balance {
    /// Margin locked by open orders and positions.
    pub fn locked(&self) -> Decimal {
        self.order_margin.unwrap_or_default() + self.position_margin.unwrap_or_default()
    }
}
