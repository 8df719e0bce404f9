//! In-memory caches reconstructed from the stream.
//!
//! Callers read through the `get_*` / `all_*` accessors. Every mutator is
//! `pub(crate)` and only the message router calls them, so the router is the
//! single writer.

use crate::domain::balance::Balance;
use crate::domain::order::{Order, OrderUpdate};
use crate::domain::orderbook::{ApplyOutcome, BookFrame, OrderbookState};
use crate::domain::position::{Position, PositionUpdate};
use crate::domain::ticker::Ticker;
use crate::domain::trade::{Fill, Trade, TradeHistory};
use std::collections::HashMap;

/// All reconstructed market and account state.
#[derive(Debug, Clone)]
pub struct StateCaches {
    tickers: HashMap<String, Ticker>,
    orderbooks: HashMap<String, OrderbookState>,
    balances: HashMap<String, Balance>,
    positions: HashMap<String, Position>,
    orders: HashMap<String, Order>,
    trades: HashMap<String, TradeHistory<Trade>>,
    fills: HashMap<String, TradeHistory<Fill>>,
    history_size: usize,
}

impl Default for StateCaches {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_TRADE_HISTORY_SIZE)
    }
}

impl StateCaches {
    pub fn new(history_size: usize) -> Self {
        Self {
            tickers: HashMap::new(),
            orderbooks: HashMap::new(),
            balances: HashMap::new(),
            positions: HashMap::new(),
            orders: HashMap::new(),
            trades: HashMap::new(),
            fills: HashMap::new(),
            history_size,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub fn get_ticker(&self, symbol: &str) -> Option<&Ticker> {
        self.tickers.get(symbol)
    }

    pub fn all_tickers(&self) -> Vec<Ticker> {
        self.tickers.values().cloned().collect()
    }

    pub fn get_orderbook(&self, symbol: &str) -> Option<&OrderbookState> {
        self.orderbooks.get(symbol)
    }

    pub fn all_orderbooks(&self) -> Vec<OrderbookState> {
        self.orderbooks.values().cloned().collect()
    }

    pub fn get_balance(&self, asset_symbol: &str) -> Option<&Balance> {
        self.balances.get(asset_symbol)
    }

    pub fn all_balances(&self) -> Vec<Balance> {
        self.balances.values().cloned().collect()
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn all_positions(&self) -> Vec<Position> {
        self.positions.values().cloned().collect()
    }

    pub fn get_order(&self, id: &str) -> Option<&Order> {
        self.orders.get(id)
    }

    pub fn all_orders(&self) -> Vec<Order> {
        self.orders.values().cloned().collect()
    }

    /// Orders resting on `symbol`.
    pub fn orders_for(&self, symbol: &str) -> Vec<Order> {
        self.orders
            .values()
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect()
    }

    /// Recent trades for `symbol`, newest first.
    pub fn trades(&self, symbol: &str) -> Vec<Trade> {
        self.trades
            .get(symbol)
            .map(TradeHistory::to_vec)
            .unwrap_or_default()
    }

    /// Recent fills for `symbol`, newest first.
    pub fn fills(&self, symbol: &str) -> Vec<Fill> {
        self.fills
            .get(symbol)
            .map(TradeHistory::to_vec)
            .unwrap_or_default()
    }

    pub fn all_fills(&self) -> Vec<Fill> {
        self.fills.values().flat_map(TradeHistory::to_vec).collect()
    }

    // ── Writes (router only) ─────────────────────────────────────────────

    pub(crate) fn upsert_ticker(&mut self, ticker: Ticker) {
        self.tickers.insert(ticker.symbol.clone(), ticker);
    }

    pub(crate) fn apply_book(&mut self, frame: &BookFrame) -> ApplyOutcome {
        self.orderbooks
            .entry(frame.symbol.clone())
            .or_insert_with(|| OrderbookState::new(frame.symbol.clone()))
            .apply(frame)
    }

    pub(crate) fn upsert_balance(&mut self, balance: Balance) {
        self.balances.insert(balance.asset_symbol.clone(), balance);
    }

    pub(crate) fn apply_position(&mut self, update: PositionUpdate) {
        match update {
            PositionUpdate::Snapshot(positions) => {
                self.positions = positions
                    .into_iter()
                    .map(|p| (p.symbol.clone(), p))
                    .collect();
            }
            PositionUpdate::Upsert(position) => {
                self.positions.insert(position.symbol.clone(), position);
            }
            PositionUpdate::Remove(position) => {
                self.positions.remove(&position.symbol);
            }
        }
    }

    pub(crate) fn apply_order(&mut self, update: OrderUpdate) {
        match update {
            OrderUpdate::Snapshot(orders) => {
                self.orders = orders.into_iter().map(|o| (o.id.clone(), o)).collect();
            }
            OrderUpdate::Upsert(order) => {
                self.orders.insert(order.id.clone(), order);
            }
            OrderUpdate::Remove(order) => {
                self.orders.remove(&order.id);
            }
        }
    }

    pub(crate) fn push_trade(&mut self, trade: Trade) {
        let size = self.history_size;
        self.trades
            .entry(trade.symbol.clone())
            .or_insert_with(|| TradeHistory::new(trade.symbol.clone(), size))
            .push(trade);
    }

    pub(crate) fn push_fill(&mut self, fill: Fill) {
        let size = self.history_size;
        self.fills
            .entry(fill.symbol.clone())
            .or_insert_with(|| TradeHistory::new(fill.symbol.clone(), size))
            .push(fill);
    }

    // ── Eviction on unsubscribe ──────────────────────────────────────────

    pub(crate) fn evict_tickers<'a>(&mut self, symbols: impl IntoIterator<Item = &'a String>) {
        for symbol in symbols {
            self.tickers.remove(symbol);
        }
    }

    pub(crate) fn evict_orderbooks<'a>(&mut self, symbols: impl IntoIterator<Item = &'a String>) {
        for symbol in symbols {
            self.orderbooks.remove(symbol);
        }
    }

    pub(crate) fn evict_trades<'a>(&mut self, symbols: impl IntoIterator<Item = &'a String>) {
        for symbol in symbols {
            self.trades.remove(symbol);
        }
    }

    pub(crate) fn evict_positions<'a>(&mut self, symbols: impl IntoIterator<Item = &'a String>) {
        for symbol in symbols {
            self.positions.remove(symbol);
        }
    }

    pub(crate) fn evict_orders<'a>(&mut self, symbols: impl IntoIterator<Item = &'a String>) {
        let symbols: Vec<&String> = symbols.into_iter().collect();
        self.orders.retain(|_, o| !symbols.contains(&&o.symbol));
    }

    pub(crate) fn evict_fills<'a>(&mut self, symbols: impl IntoIterator<Item = &'a String>) {
        for symbol in symbols {
            self.fills.remove(symbol);
        }
    }

    pub(crate) fn clear_tickers(&mut self) {
        self.tickers.clear();
    }

    pub(crate) fn clear_trades(&mut self) {
        self.trades.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::orderbook::{BookAction, PriceLevel};
    use crate::shared::Side;
    use rust_decimal::Decimal;

    fn position(symbol: &str, size: i64) -> Position {
        Position {
            symbol: symbol.to_string(),
            product_id: None,
            size: Decimal::from(size),
            entry_price: None,
            margin: None,
            liquidation_price: None,
            bankruptcy_price: None,
            realized_pnl: None,
            realized_funding: None,
            timestamp: None,
        }
    }

    fn trade(symbol: &str, price: i64) -> Trade {
        Trade {
            symbol: symbol.to_string(),
            trade_id: None,
            price: Decimal::from(price),
            size: Decimal::ONE,
            side: Side::Buy,
            buyer_role: None,
            seller_role: None,
            timestamp: None,
        }
    }

    #[test]
    fn test_position_upsert_and_remove() {
        let mut caches = StateCaches::new(10);
        caches.apply_position(PositionUpdate::Upsert(position("BTCUSD", 2)));
        assert!(caches.get_position("BTCUSD").is_some());
        caches.apply_position(PositionUpdate::Remove(position("BTCUSD", 0)));
        assert!(caches.get_position("BTCUSD").is_none());
    }

    #[test]
    fn test_position_snapshot_replaces() {
        let mut caches = StateCaches::new(10);
        caches.apply_position(PositionUpdate::Upsert(position("OLD", 1)));
        caches.apply_position(PositionUpdate::Snapshot(vec![position("NEW", 1)]));
        assert!(caches.get_position("OLD").is_none());
        assert_eq!(caches.all_positions().len(), 1);
    }

    #[test]
    fn test_trade_history_is_capped_per_symbol() {
        let mut caches = StateCaches::new(2);
        for price in 1..=3 {
            caches.push_trade(trade("BTCUSD", price));
        }
        caches.push_trade(trade("ETHUSD", 9));
        let btc = caches.trades("BTCUSD");
        assert_eq!(btc.len(), 2);
        assert_eq!(btc[0].price, Decimal::from(3));
        assert_eq!(caches.trades("ETHUSD").len(), 1);
        assert!(caches.trades("SOLUSD").is_empty());
    }

    #[test]
    fn test_book_created_on_first_frame() {
        let mut caches = StateCaches::new(10);
        let frame = BookFrame {
            symbol: "BTCUSD".into(),
            action: BookAction::Snapshot,
            bids: vec![PriceLevel::new(Decimal::from(100), Decimal::ONE)],
            asks: vec![],
            sequence_no: None,
            prev_sequence_no: None,
            checksum: None,
            timestamp: None,
        };
        assert_eq!(caches.apply_book(&frame), ApplyOutcome::Applied);
        assert_eq!(
            caches.get_orderbook("BTCUSD").and_then(|b| b.best_bid()),
            Some(PriceLevel::new(Decimal::from(100), Decimal::ONE))
        );
        caches.evict_orderbooks([&"BTCUSD".to_string()]);
        assert!(caches.get_orderbook("BTCUSD").is_none());
    }
}
