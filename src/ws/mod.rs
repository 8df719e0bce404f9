//! WebSocket layer — messages, session state, subscriptions, events.
//!
//! The transport is the `tokio-tungstenite` driver in `native.rs`
//! (`ws-native` feature). Everything else here is transport-agnostic:
//! the wire union, the sans-IO session state machine, the subscription
//! registry and the message router.

pub mod router;
pub mod session;
pub mod subscriptions;

#[cfg(feature = "ws-native")]
pub mod native;

use crate::domain::balance::wire::WsMargin;
use crate::domain::balance::Balance;
use crate::domain::order::wire::OrdersFrame;
use crate::domain::order::Order;
use crate::domain::orderbook::wire::{L2Orderbook, L2Update};
use crate::domain::position::wire::PositionsFrame;
use crate::domain::position::Position;
use crate::domain::ticker::wire::TickerFrame;
use crate::domain::ticker::Ticker;
use crate::domain::trade::wire::{WsTrade, WsTradeSnapshot, WsUserTrade};
use crate::domain::trade::{Fill, Trade};
use crate::error::WsError;
use crate::shared::serde_util;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

pub use router::{Control, MessageRouter, RouteOutcome};
pub use session::{Backoff, CloseDecision, OpenAction, Session};
pub use subscriptions::{
    Channel, ChannelSpec, SubscribeOutcome, SubscriptionPayload, SubscriptionRegistry, SymbolSet,
};

// ─── Outbound messages ───────────────────────────────────────────────────────

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum MessageOut {
    #[serde(rename = "auth")]
    Auth {
        api_key: String,
        signature: String,
        timestamp: String,
    },
    #[serde(rename = "subscribe")]
    Subscribe { payload: SubscriptionPayload },
    #[serde(rename = "unsubscribe")]
    Unsubscribe { payload: SubscriptionPayload },
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
}

impl MessageOut {
    pub fn subscribe(channel: Channel, symbols: &SymbolSet) -> Self {
        MessageOut::Subscribe {
            payload: SubscriptionPayload::single(channel, symbols),
        }
    }

    pub fn unsubscribe(channel: Channel, symbols: &SymbolSet) -> Self {
        MessageOut::Unsubscribe {
            payload: SubscriptionPayload::single(channel, symbols),
        }
    }
}

// ─── Inbound messages ────────────────────────────────────────────────────────

/// `type` values decoded into [`Kind`]. Anything else is surfaced as
/// [`MessageIn::Unknown`].
const KNOWN_TYPES: &[&str] = &[
    "v2/ticker",
    "v2_ticker",
    "l2_orderbook",
    "l2_updates",
    "all_trades",
    "all_trades_snapshot",
    "margins",
    "positions",
    "orders",
    "v2/user_trades",
    "auth",
    "key-auth",
    "ping",
    "pong",
    "heartbeat",
    "subscriptions",
    "error",
];

/// A parsed inbound frame.
#[derive(Debug, Clone)]
pub enum MessageIn {
    Known(Kind),
    Unknown {
        kind: String,
        payload: serde_json::Value,
    },
}

impl MessageIn {
    /// Parse a text frame. Fails with `WsError::MessageParse` for malformed
    /// JSON, a missing `type`, or a known type with an invalid body.
    pub fn parse(text: &str) -> Result<Self, WsError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| WsError::MessageParse("missing \"type\" field".into()))?
            .to_string();

        if KNOWN_TYPES.contains(&kind.as_str()) {
            let parsed: Kind = serde_json::from_value(value)
                .map_err(|e| WsError::MessageParse(format!("{}: {}", kind, e)))?;
            Ok(MessageIn::Known(parsed))
        } else {
            Ok(MessageIn::Unknown {
                kind,
                payload: value,
            })
        }
    }
}

/// The type of inbound WebSocket message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Kind {
    #[serde(rename = "v2/ticker", alias = "v2_ticker")]
    Ticker(TickerFrame),
    #[serde(rename = "l2_orderbook")]
    L2Orderbook(L2Orderbook),
    #[serde(rename = "l2_updates")]
    L2Updates(L2Update),
    #[serde(rename = "all_trades")]
    AllTrades(WsTrade),
    #[serde(rename = "all_trades_snapshot")]
    AllTradesSnapshot(WsTradeSnapshot),
    #[serde(rename = "margins")]
    Margins(WsMargin),
    #[serde(rename = "positions")]
    Positions(PositionsFrame),
    #[serde(rename = "orders")]
    Orders(OrdersFrame),
    #[serde(rename = "v2/user_trades")]
    UserTrades(WsUserTrade),
    #[serde(rename = "auth", alias = "key-auth")]
    Auth(AuthAck),
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "heartbeat")]
    Heartbeat,
    #[serde(rename = "subscriptions")]
    Subscriptions(SubscriptionsAck),
    #[serde(rename = "error")]
    Error(ServerError),
}

/// Reply to the signed auth challenge.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AuthAck {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl AuthAck {
    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(false)
            || self
                .status
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case("authenticated"))
    }

    /// Human-readable rejection reason.
    pub fn reason(&self) -> String {
        self.message
            .clone()
            .or_else(|| self.status.clone())
            .unwrap_or_else(|| "rejected by server".to_string())
    }
}

/// Acknowledgement listing the channels now active on the connection.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SubscriptionsAck {
    #[serde(default)]
    pub channels: Vec<ChannelSpec>,
}

/// An `error` frame from the exchange.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ServerError {
    #[serde(default, with = "serde_util::string_opt")]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<ServerError> for WsError {
    fn from(e: ServerError) -> Self {
        WsError::Server {
            code: e.code,
            message: e.message.unwrap_or_else(|| "unspecified server error".to_string()),
        }
    }
}

// ─── Session state ───────────────────────────────────────────────────────────

/// Connection lifecycle state. Only the transport session transitions it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SessionState {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Authenticating = 3,
    Authenticated = 4,
    Reconnecting = 5,
    Closing = 6,
}

impl SessionState {
    /// Whether a socket is open.
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            SessionState::Connected | SessionState::Authenticating | SessionState::Authenticated
        )
    }

    /// Whether a connection exists or is being established.
    pub fn is_active(&self) -> bool {
        self.is_connected() || *self == SessionState::Connecting
    }
}

impl From<u8> for SessionState {
    fn from(v: u8) -> Self {
        match v {
            1 => SessionState::Connecting,
            2 => SessionState::Connected,
            3 => SessionState::Authenticating,
            4 => SessionState::Authenticated,
            5 => SessionState::Reconnecting,
            6 => SessionState::Closing,
            _ => SessionState::Disconnected,
        }
    }
}

/// Lock-free shared cell holding the current [`SessionState`].
#[derive(Debug, Clone, Default)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> SessionState {
        SessionState::from(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn store(&self, state: SessionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

// ─── WsEvent ─────────────────────────────────────────────────────────────────

/// High-level events published to consumers.
#[derive(Debug, Clone)]
pub enum WsEvent {
    /// Socket open.
    Connected,
    /// Auth challenge accepted.
    Authenticated,
    /// Connection lost (a reconnect may follow).
    Disconnected { code: Option<u16>, reason: String },
    /// A reconnect attempt is scheduled.
    Reconnecting { attempt: u32, delay_ms: u64 },
    Ticker(Ticker),
    /// The book for `symbol` changed; read it from the caches.
    OrderBook { symbol: String, is_snapshot: bool },
    Trade(Trade),
    Balance(Balance),
    Position(Position),
    PositionClosed { symbol: String },
    Order(Order),
    OrderRemoved(Order),
    UserTrade(Fill),
    /// Server confirmation of active channels.
    SubscriptionAck { channels: Vec<ChannelSpec> },
    /// A frame whose `type` is not modeled.
    Unknown {
        kind: String,
        payload: serde_json::Value,
    },
    Error(WsError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn known(text: &str) -> Kind {
        match MessageIn::parse(text).unwrap() {
            MessageIn::Known(kind) => kind,
            other => panic!("expected known message, got {:?}", other),
        }
    }

    #[test]
    fn test_auth_serialization() {
        let msg = MessageOut::Auth {
            api_key: "key".into(),
            signature: "abc".into(),
            timestamp: "1700000000".into(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type":"auth","api_key":"key","signature":"abc","timestamp":"1700000000"})
        );
    }

    #[test]
    fn test_subscribe_serialization() {
        let msg = MessageOut::subscribe(
            Channel::Ticker,
            &SymbolSet::from_symbols(["ETHUSD", "BTCUSD"]),
        );
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type":"subscribe","payload":{"channels":[
                {"name":"v2/ticker","symbols":["BTCUSD","ETHUSD"]}]}})
        );
    }

    #[test]
    fn test_ping_pong_serialization() {
        assert_eq!(serde_json::to_string(&MessageOut::Ping).unwrap(), r#"{"type":"ping"}"#);
        assert_eq!(serde_json::to_string(&MessageOut::Pong).unwrap(), r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_parse_control_frames() {
        assert!(matches!(known(r#"{"type":"ping"}"#), Kind::Ping));
        assert!(matches!(known(r#"{"type":"pong"}"#), Kind::Pong));
        assert!(matches!(known(r#"{"type":"heartbeat","ts":1}"#), Kind::Heartbeat));
        match known(r#"{"type":"auth","success":true,"status":"authenticated"}"#) {
            Kind::Auth(ack) => assert!(ack.is_success()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_ticker_alias() {
        assert!(matches!(
            known(r#"{"type":"v2_ticker","symbol":"BTCUSD","close":"1"}"#),
            Kind::Ticker(_)
        ));
        assert!(matches!(
            known(r#"{"type":"v2/ticker","symbol":"BTCUSD","close":"1"}"#),
            Kind::Ticker(_)
        ));
    }

    #[test]
    fn test_unknown_type_preserved() {
        match MessageIn::parse(r#"{"type":"candlestick_1m","symbol":"BTCUSD"}"#).unwrap() {
            MessageIn::Unknown { kind, payload } => {
                assert_eq!(kind, "candlestick_1m");
                assert_eq!(payload["symbol"], "BTCUSD");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(MessageIn::parse("{oops"), Err(WsError::MessageParse(_))));
        assert!(matches!(MessageIn::parse(r#"{"symbol":"X"}"#), Err(WsError::MessageParse(_))));
        assert!(matches!(
            MessageIn::parse(r#"{"type":"all_trades","symbol":"X"}"#),
            Err(WsError::MessageParse(_))
        ));
    }

    #[test]
    fn test_server_error_conversion() {
        match known(r#"{"type":"error","code":401,"message":"bad signature"}"#) {
            Kind::Error(e) => assert_eq!(
                WsError::from(e),
                WsError::Server {
                    code: Some("401".into()),
                    message: "bad signature".into()
                }
            ),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_session_state_roundtrip_through_cell() {
        let cell = StateCell::new();
        assert_eq!(cell.load(), SessionState::Disconnected);
        cell.store(SessionState::Authenticating);
        assert_eq!(cell.load(), SessionState::Authenticating);
        assert!(cell.load().is_connected());
        assert!(!SessionState::Reconnecting.is_connected());
    }
}
