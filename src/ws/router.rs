//! Message router — classifies inbound frames and dispatches them.
//!
//! The router is the only writer of [`StateCaches`]. Control frames (ping,
//! pong, heartbeat, auth, subscription acks) never reach consumers as data;
//! they come back to the driver as replies or [`Control`] signals.

use std::sync::Arc;

use async_lock::RwLock;

use crate::domain::balance::Balance;
use crate::domain::order::OrderUpdate;
use crate::domain::orderbook::{ApplyOutcome, BookAction, BookFrame};
use crate::domain::position::PositionUpdate;
use crate::domain::ticker::Ticker;
use crate::domain::trade::{Fill, Trade};
use crate::error::WsError;
use crate::events::EventBus;
use crate::health::HealthMonitor;
use crate::state::StateCaches;
use crate::ws::subscriptions::{Channel, SymbolSet};
use crate::ws::{Kind, MessageIn, MessageOut, WsEvent};

/// Session-level signal extracted from a control frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Control {
    /// A `pong` or `heartbeat` arrived.
    Liveness,
    /// The auth challenge was answered.
    Auth(Result<(), String>),
}

/// What the driver must do after routing one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteOutcome {
    /// Frames to send back before reading the next one.
    pub replies: Vec<MessageOut>,
    pub control: Option<Control>,
}

impl RouteOutcome {
    fn reply(msg: MessageOut) -> Self {
        Self {
            replies: vec![msg],
            control: None,
        }
    }

    fn control(control: Control) -> Self {
        Self {
            replies: Vec::new(),
            control: Some(control),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageRouter {
    caches: Arc<RwLock<StateCaches>>,
    health: Arc<HealthMonitor>,
    events: EventBus,
}

impl MessageRouter {
    pub fn new(caches: Arc<RwLock<StateCaches>>, health: Arc<HealthMonitor>, events: EventBus) -> Self {
        Self {
            caches,
            health,
            events,
        }
    }

    pub fn caches(&self) -> &Arc<RwLock<StateCaches>> {
        &self.caches
    }

    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) fn emit(&self, event: WsEvent) {
        self.events.publish(event);
    }

    /// Record an error in the health log and publish it.
    pub(crate) fn report_error(&self, error: WsError) {
        self.health.record_error(error.clone());
        self.events.publish(WsEvent::Error(error));
    }

    /// Route one inbound text frame. Never panics; malformed frames are
    /// counted, reported and dropped.
    pub async fn route(&self, text: &str) -> RouteOutcome {
        self.health.record_message_received();

        match MessageIn::parse(text) {
            Ok(MessageIn::Known(kind)) => self.dispatch(kind).await,
            Ok(MessageIn::Unknown { kind, payload }) => {
                tracing::debug!("Unhandled message type: {}", kind);
                self.emit(WsEvent::Unknown { kind, payload });
                RouteOutcome::default()
            }
            Err(e) => {
                tracing::warn!("Dropping malformed frame: {} (raw: {})", e, text);
                self.health.record_parse_error();
                self.report_error(e);
                RouteOutcome::default()
            }
        }
    }

    async fn dispatch(&self, kind: Kind) -> RouteOutcome {
        match kind {
            // ── Control ──────────────────────────────────────────────────
            Kind::Ping => return RouteOutcome::reply(MessageOut::Pong),
            Kind::Pong | Kind::Heartbeat => {
                self.health.record_heartbeat();
                return RouteOutcome::control(Control::Liveness);
            }
            Kind::Auth(ack) => {
                let result = if ack.is_success() {
                    Ok(())
                } else {
                    Err(ack.reason())
                };
                return RouteOutcome::control(Control::Auth(result));
            }
            Kind::Subscriptions(ack) => {
                tracing::debug!("Subscriptions acknowledged: {:?}", ack.channels);
                self.emit(WsEvent::SubscriptionAck {
                    channels: ack.channels,
                });
            }
            Kind::Error(frame) => {
                let error = WsError::from(frame);
                tracing::warn!("Server error frame: {}", error);
                self.report_error(error);
            }

            // ── Market data ──────────────────────────────────────────────
            Kind::Ticker(frame) => {
                let ticker = Ticker::from(frame);
                self.caches.write().await.upsert_ticker(ticker.clone());
                self.emit(WsEvent::Ticker(ticker));
            }
            Kind::L2Orderbook(book) => self.on_book(BookFrame::from(book)).await,
            Kind::L2Updates(update) => self.on_book(BookFrame::from(update)).await,
            Kind::AllTrades(wire) => {
                let trade = Trade::from(wire);
                self.caches.write().await.push_trade(trade.clone());
                self.emit(WsEvent::Trade(trade));
            }
            Kind::AllTradesSnapshot(snapshot) => {
                // Snapshot entries arrive newest first.
                let trades: Vec<Trade> = snapshot.into_trades().into_iter().rev().collect();
                {
                    let mut caches = self.caches.write().await;
                    for trade in &trades {
                        caches.push_trade(trade.clone());
                    }
                }
                for trade in trades {
                    self.emit(WsEvent::Trade(trade));
                }
            }

            // ── Account ──────────────────────────────────────────────────
            Kind::Margins(wire) => {
                let balance = Balance::from(wire);
                self.caches.write().await.upsert_balance(balance.clone());
                self.emit(WsEvent::Balance(balance));
            }
            Kind::Positions(frame) => {
                let update = PositionUpdate::from(frame);
                let events = position_events(&update);
                self.caches.write().await.apply_position(update);
                for event in events {
                    self.emit(event);
                }
            }
            Kind::Orders(frame) => {
                let update = OrderUpdate::from(frame);
                let events = order_events(&update);
                self.caches.write().await.apply_order(update);
                for event in events {
                    self.emit(event);
                }
            }
            Kind::UserTrades(wire) => {
                let fill = Fill::from(wire);
                self.caches.write().await.push_fill(fill.clone());
                self.emit(WsEvent::UserTrade(fill));
            }
        }
        RouteOutcome::default()
    }

    async fn on_book(&self, frame: BookFrame) {
        let outcome = self.caches.write().await.apply_book(&frame);
        match outcome {
            ApplyOutcome::Applied => self.emit(WsEvent::OrderBook {
                symbol: frame.symbol,
                is_snapshot: frame.action == BookAction::Snapshot,
            }),
            ApplyOutcome::NoSnapshot => {
                tracing::debug!("Ignoring book diff for {} before snapshot", frame.symbol)
            }
            ApplyOutcome::Stale => {}
        }
    }

    /// Drop cached entries for symbols that were unsubscribed.
    pub(crate) async fn evict(&self, channel: Channel, symbols: &SymbolSet) {
        let mut caches = self.caches.write().await;
        match (channel, symbols) {
            (Channel::Ticker, SymbolSet::All) => caches.clear_tickers(),
            (Channel::Ticker, SymbolSet::Symbols(s)) => caches.evict_tickers(s),
            (Channel::L2Orderbook | Channel::L2Updates, SymbolSet::Symbols(s)) => {
                caches.evict_orderbooks(s)
            }
            (Channel::AllTrades, SymbolSet::All) => caches.clear_trades(),
            (Channel::AllTrades, SymbolSet::Symbols(s)) => caches.evict_trades(s),
            (Channel::Positions, SymbolSet::Symbols(s)) => caches.evict_positions(s),
            (Channel::Orders, SymbolSet::Symbols(s)) => caches.evict_orders(s),
            (Channel::UserTrades, SymbolSet::Symbols(s)) => caches.evict_fills(s),
            // Account-wide state stays until the exchange says otherwise.
            _ => {}
        }
    }
}

fn position_events(update: &PositionUpdate) -> Vec<WsEvent> {
    match update {
        PositionUpdate::Snapshot(positions) => {
            positions.iter().cloned().map(WsEvent::Position).collect()
        }
        PositionUpdate::Upsert(position) => vec![WsEvent::Position(position.clone())],
        PositionUpdate::Remove(position) => vec![WsEvent::PositionClosed {
            symbol: position.symbol.clone(),
        }],
    }
}

fn order_events(update: &OrderUpdate) -> Vec<WsEvent> {
    match update {
        OrderUpdate::Snapshot(orders) => orders.iter().cloned().map(WsEvent::Order).collect(),
        OrderUpdate::Upsert(order) => vec![WsEvent::Order(order.clone())],
        OrderUpdate::Remove(order) => vec![WsEvent::OrderRemoved(order.clone())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Topic;
    use crate::ws::StateCell;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn router() -> MessageRouter {
        MessageRouter::new(
            Arc::new(RwLock::new(StateCaches::new(10))),
            Arc::new(HealthMonitor::new(StateCell::new(), 10)),
            EventBus::new(64),
        )
    }

    #[tokio::test]
    async fn test_ping_yields_exactly_one_pong() {
        let router = router();
        let outcome = router.route(r#"{"type":"ping"}"#).await;
        assert_eq!(outcome.replies, vec![MessageOut::Pong]);
        assert!(outcome.control.is_none());
    }

    #[tokio::test]
    async fn test_pong_and_heartbeat_signal_liveness() {
        let router = router();
        for frame in [r#"{"type":"pong"}"#, r#"{"type":"heartbeat"}"#] {
            let outcome = router.route(frame).await;
            assert_eq!(outcome.control, Some(Control::Liveness));
            assert!(outcome.replies.is_empty());
        }
        assert!(router.health().snapshot().last_heartbeat.is_some());
    }

    #[tokio::test]
    async fn test_auth_ack() {
        let router = router();
        let ok = router.route(r#"{"type":"auth","success":true}"#).await;
        assert_eq!(ok.control, Some(Control::Auth(Ok(()))));
        let rejected = router
            .route(r#"{"type":"auth","success":false,"message":"invalid api key"}"#)
            .await;
        assert_eq!(
            rejected.control,
            Some(Control::Auth(Err("invalid api key".to_string())))
        );
    }

    #[tokio::test]
    async fn test_malformed_frame_counted_then_next_processed() {
        let router = router();
        let mut errors = router.events().subscribe(&[Topic::Error]);

        let outcome = router.route("{not json").await;
        assert_eq!(outcome, RouteOutcome::default());
        assert_eq!(router.health().parse_errors(), 1);
        assert!(matches!(
            errors.recv().await,
            Some(WsEvent::Error(WsError::MessageParse(_)))
        ));

        router
            .route(r#"{"type":"v2/ticker","symbol":"BTCUSD","close":"100"}"#)
            .await;
        let caches = router.caches().read().await;
        assert_eq!(
            caches.get_ticker("BTCUSD").map(|t| t.last_price),
            Some(Decimal::from(100))
        );
        assert_eq!(router.health().snapshot().messages_received, 2);
    }

    #[tokio::test]
    async fn test_position_present_then_absent() {
        let router = router();
        let mut events = router.events().subscribe(&[Topic::Position]);

        router
            .route(r#"{"type":"positions","action":"update","symbol":"BTCUSD","size":"0.5"}"#)
            .await;
        assert_eq!(
            router
                .caches()
                .read()
                .await
                .get_position("BTCUSD")
                .map(|p| p.size),
            Some(Decimal::from_str("0.5").unwrap())
        );

        router
            .route(r#"{"type":"positions","action":"update","symbol":"BTCUSD","size":"0"}"#)
            .await;
        assert!(router.caches().read().await.get_position("BTCUSD").is_none());

        assert!(matches!(events.recv().await, Some(WsEvent::Position(_))));
        assert!(matches!(
            events.recv().await,
            Some(WsEvent::PositionClosed { symbol }) if symbol == "BTCUSD"
        ));
    }

    #[tokio::test]
    async fn test_book_snapshot_then_diff() {
        let router = router();
        let mut events = router.events().subscribe(&[Topic::OrderBook]);

        // Diff before snapshot is ignored.
        router
            .route(r#"{"type":"l2_updates","symbol":"BTCUSD","action":"update","bids":[["100","1"]],"asks":[]}"#)
            .await;
        assert!(router.caches().read().await.get_orderbook("BTCUSD").map_or(true, |b| b.is_empty()));

        router
            .route(r#"{"type":"l2_updates","symbol":"BTCUSD","action":"snapshot",
                "bids":[["100","1"],["99","2"]],"asks":[["101","3"]],"sequence_no":1}"#)
            .await;
        router
            .route(r#"{"type":"l2_updates","symbol":"BTCUSD","action":"update",
                "bids":[["100","0"]],"asks":[],"sequence_no":2,"prev_sequence_no":1}"#)
            .await;

        let caches = router.caches().read().await;
        let book = caches.get_orderbook("BTCUSD").unwrap();
        assert_eq!(book.best_bid().map(|l| l.price), Some(Decimal::from(99)));
        assert_eq!(book.last_sequence(), Some(2));
        drop(caches);

        assert!(matches!(
            events.recv().await,
            Some(WsEvent::OrderBook { is_snapshot: true, .. })
        ));
        assert!(matches!(
            events.recv().await,
            Some(WsEvent::OrderBook { is_snapshot: false, .. })
        ));
    }

    #[tokio::test]
    async fn test_order_lifecycle() {
        let router = router();
        router
            .route(r#"{"type":"orders","action":"create","id":42,"symbol":"BTCUSD","side":"buy",
                "size":5,"unfilled_size":5,"limit_price":"60000","state":"open"}"#)
            .await;
        assert!(router.caches().read().await.get_order("42").is_some());
        router
            .route(r#"{"type":"orders","action":"update","id":42,"symbol":"BTCUSD","side":"buy",
                "size":5,"unfilled_size":0,"state":"closed"}"#)
            .await;
        assert!(router.caches().read().await.get_order("42").is_none());
    }

    #[tokio::test]
    async fn test_trades_and_fills() {
        let router = router();
        router
            .route(r#"{"type":"all_trades","symbol":"ETHUSD","price":"3000","size":2,
                "buyer_role":"taker","seller_role":"maker"}"#)
            .await;
        router
            .route(r#"{"type":"v2/user_trades","symbol":"ETHUSD","fill_id":"f1","order_id":"9",
                "side":"buy","price":"3000","size":"1","role":"taker"}"#)
            .await;
        let caches = router.caches().read().await;
        assert_eq!(caches.trades("ETHUSD").len(), 1);
        assert_eq!(caches.fills("ETHUSD")[0].fill_id, "f1");
    }

    #[tokio::test]
    async fn test_unknown_and_server_error() {
        let router = router();
        let mut events = router.events().subscribe(&[Topic::Unknown, Topic::Error]);
        router.route(r#"{"type":"announcements","message":"hi"}"#).await;
        router
            .route(r#"{"type":"error","code":"rate_limited","message":"slow down"}"#)
            .await;

        assert!(matches!(
            events.recv().await,
            Some(WsEvent::Unknown { kind, .. }) if kind == "announcements"
        ));
        assert!(matches!(
            events.recv().await,
            Some(WsEvent::Error(WsError::Server { .. }))
        ));
        assert_eq!(router.health().snapshot().recent_errors.len(), 1);
    }

    #[tokio::test]
    async fn test_evict_on_unsubscribe() {
        let router = router();
        router
            .route(r#"{"type":"v2/ticker","symbol":"BTCUSD","close":"1"}"#)
            .await;
        router
            .route(r#"{"type":"v2/ticker","symbol":"ETHUSD","close":"1"}"#)
            .await;
        router
            .evict(Channel::Ticker, &SymbolSet::from_symbols(["BTCUSD"]))
            .await;
        let caches = router.caches().read().await;
        assert!(caches.get_ticker("BTCUSD").is_none());
        assert!(caches.get_ticker("ETHUSD").is_some());
    }
}
