//! # delta-stream
//!
//! A resilient streaming client for the Delta Exchange WebSocket API.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core** — Shared types and domain models (tickers, books, trades, account state)
//! 2. **Auth** — Signed challenge for private channels
//! 3. **State** — Reconstructed caches, health counters, event fan-out
//! 4. **WebSocket** — Session state machine, subscription registry, router, `tokio-tungstenite` driver
//! 5. **High-Level Client** — `DeltaStreamClient` tying it all together
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use delta_stream::prelude::*;
//!
//! let client = DeltaStreamClient::builder()
//!     .environment(Environment::Testnet)
//!     .build()?;
//!
//! client.subscribe_orderbook_updates(["BTCUSD"]).await?;
//! client.connect().await?;
//!
//! let mut events = client.events(&[Topic::OrderBook]);
//! while let Some(WsEvent::OrderBook { symbol, .. }) = events.recv().await {
//!     let book = client.get_orderbook(&symbol).await;
//! }
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared enums and serde helpers used across all domains.
pub mod shared;

/// Domain modules (vertical slices): types, wire types, conversions, state.
pub mod domain;

/// Error types.
pub mod error;

/// Endpoint URLs and environment selection.
pub mod network;

/// Client configuration.
pub mod config;

// ── Layer 2: Auth ────────────────────────────────────────────────────────────

/// Credentials and HMAC challenge signing.
pub mod auth;

// ── Layer 3: State ───────────────────────────────────────────────────────────

/// Caches reconstructed from the stream.
pub mod state;

/// Connection health counters.
pub mod health;

/// Broadcast event bus with topic filters.
pub mod events;

// ── Layer 4: WebSocket ───────────────────────────────────────────────────────

/// WebSocket protocol: messages, session, subscriptions, routing, driver.
pub mod ws;

// ── Layer 5: High-Level Client ───────────────────────────────────────────────

/// `DeltaStreamClient` — the primary entry point.
#[cfg(feature = "ws-native")]
pub mod client;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared
    pub use crate::shared::{Role, Side};

    // Domain types
    pub use crate::domain::balance::Balance;
    pub use crate::domain::order::{Order, OrderState};
    pub use crate::domain::orderbook::{ApplyOutcome, BookSide, OrderbookState, PriceLevel};
    pub use crate::domain::position::Position;
    pub use crate::domain::ticker::Ticker;
    pub use crate::domain::trade::{Fill, Trade, TradeHistory};

    // Errors
    pub use crate::error::{AuthError, SdkError, WsError};

    // Config + network
    pub use crate::config::StreamConfig;
    pub use crate::network::{Environment, PRODUCTION_WS_URL, TESTNET_WS_URL};

    // Auth
    pub use crate::auth::Credentials;

    // State, health, events
    pub use crate::events::{EventSubscription, Topic};
    pub use crate::health::{HealthSnapshot, RecordedError};
    pub use crate::state::StateCaches;

    // WebSocket
    pub use crate::ws::{
        Channel, MessageOut, SessionState, SubscribeOutcome, SymbolSet, WsEvent,
    };

    // High-level client
    #[cfg(feature = "ws-native")]
    pub use crate::client::{DeltaStreamClient, DeltaStreamClientBuilder};
}
