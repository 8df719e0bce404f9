use super::wire::WsMargin;
use super::Balance;

impl From<WsMargin> for Balance {
    fn from(m: WsMargin) -> Self {
        Self {
            asset_symbol: m.asset_symbol,
            asset_id: m.asset_id,
            balance: m.balance,
            available_balance: m.available_balance,
            order_margin: m.order_margin,
            position_margin: m.position_margin,
            commission: m.commission,
            timestamp: m.timestamp,
        }
    }
}
