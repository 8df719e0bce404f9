//! Conversions from wire types to domain types for trades and fills.

use super::wire::{SnapshotTrade, WsTrade, WsTradeSnapshot, WsUserTrade};
use super::{Fill, Trade};
use crate::shared::{Role, Side};

/// The aggressor is whoever took liquidity. Absent roles default to `Buy`.
fn aggressor_side(buyer_role: Option<Role>, seller_role: Option<Role>) -> Side {
    match (buyer_role, seller_role) {
        (_, Some(Role::Taker)) | (Some(Role::Maker), _) => Side::Sell,
        _ => Side::Buy,
    }
}

impl From<WsTrade> for Trade {
    fn from(t: WsTrade) -> Self {
        Self {
            side: aggressor_side(t.buyer_role, t.seller_role),
            symbol: t.symbol,
            trade_id: t.trade_id,
            price: t.price,
            size: t.size,
            buyer_role: t.buyer_role,
            seller_role: t.seller_role,
            timestamp: t.timestamp,
        }
    }
}

impl Trade {
    fn from_snapshot_entry(symbol: &str, t: SnapshotTrade) -> Self {
        Self {
            symbol: symbol.to_string(),
            trade_id: None,
            side: aggressor_side(t.buyer_role, t.seller_role),
            price: t.price,
            size: t.size,
            buyer_role: t.buyer_role,
            seller_role: t.seller_role,
            timestamp: t.timestamp,
        }
    }
}

impl WsTradeSnapshot {
    /// Expand into trades in the order the exchange sent them.
    pub fn into_trades(self) -> Vec<Trade> {
        let symbol = self.symbol;
        self.trades
            .into_iter()
            .map(|t| Trade::from_snapshot_entry(&symbol, t))
            .collect()
    }
}

impl From<WsUserTrade> for Fill {
    fn from(t: WsUserTrade) -> Self {
        let fill_id = t.fill_id.unwrap_or_else(|| {
            format!(
                "{}-{}",
                t.order_id.as_deref().unwrap_or("unknown"),
                t.timestamp.map(|ts| ts.timestamp_micros()).unwrap_or_default()
            )
        });
        Self {
            symbol: t.symbol,
            fill_id,
            order_id: t.order_id,
            client_order_id: t.client_order_id,
            side: t.side,
            price: t.price,
            size: t.size,
            role: t.role,
            reason: t.reason,
            timestamp: t.timestamp,
        }
    }
}
