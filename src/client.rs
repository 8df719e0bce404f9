//! High-level client — `DeltaStreamClient`.
//!
//! Owns the shared state (caches, registry, health, event bus) and at most one
//! driver task. Cache reads never touch the socket; subscribe calls record
//! intent in the registry and either send immediately or queue for replay.

use std::sync::Arc;
use std::time::Duration;

use async_lock::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::StreamConfig;
use crate::domain::balance::Balance;
use crate::domain::order::Order;
use crate::domain::orderbook::OrderbookState;
use crate::domain::position::Position;
use crate::domain::ticker::Ticker;
use crate::domain::trade::{Fill, Trade};
use crate::error::WsError;
use crate::events::{EventBus, EventSubscription, Topic};
use crate::health::{HealthMonitor, HealthSnapshot};
use crate::network::Environment;
use crate::state::StateCaches;
use crate::ws::native::{run_task, Command, Driver};
use crate::ws::{
    Backoff, Channel, MessageOut, MessageRouter, Session, SessionState, StateCell,
    SubscribeOutcome, SubscriptionRegistry, SymbolSet,
};

/// How long `disconnect()` waits for the driver before aborting it.
const DISCONNECT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

struct DriverHandle {
    cmd_tx: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

/// The primary entry point: one resilient connection plus reconstructed state.
///
/// ```rust,ignore
/// let client = DeltaStreamClient::builder()
///     .environment(Environment::Testnet)
///     .build()?;
/// client.subscribe_tickers(["BTCUSD"]).await?;
/// client.connect().await?;
/// let btc = client.get_ticker("BTCUSD").await;
/// ```
pub struct DeltaStreamClient {
    config: StreamConfig,
    state: StateCell,
    router: MessageRouter,
    registry: Arc<RwLock<SubscriptionRegistry>>,
    driver: Mutex<Option<DriverHandle>>,
}

impl DeltaStreamClient {
    pub fn builder() -> DeltaStreamClientBuilder {
        DeltaStreamClientBuilder::default()
    }

    pub fn new(config: StreamConfig) -> Result<Self, WsError> {
        config.validate()?;
        let state = StateCell::new();
        let health = Arc::new(HealthMonitor::new(
            state.clone(),
            config.recent_errors_capacity,
        ));
        let caches = Arc::new(RwLock::new(StateCaches::new(config.trade_history_size)));
        let events = EventBus::new(config.event_channel_capacity);
        let registry = Arc::new(RwLock::new(SubscriptionRegistry::new(
            config.has_credentials(),
        )));
        Ok(Self {
            router: MessageRouter::new(caches, health, events),
            registry,
            state,
            config,
            driver: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    // ── Connection lifecycle ─────────────────────────────────────────────

    /// Open the connection and wait until it is ready (authenticated when
    /// credentials are configured, subscriptions replayed).
    ///
    /// A no-op while a driver is connecting or connected. While the driver is
    /// waiting out a reconnect backoff it returns `WsError::NotConnected`;
    /// watch [`Topic::Connection`] events instead. Fails on authentication
    /// failure or once the reconnect budget is spent.
    pub async fn connect(&self) -> Result<(), WsError> {
        let ready_rx = {
            let mut slot = self.driver.lock().await;
            if slot.as_ref().is_some_and(|d| !d.task.is_finished()) {
                if self.state.load() == SessionState::Reconnecting {
                    return Err(WsError::NotConnected);
                }
                tracing::debug!("connect() ignored: driver already running");
                return Ok(());
            }

            let (cmd_tx, cmd_rx) = mpsc::channel(self.config.command_channel_capacity);
            let (ready_tx, ready_rx) = oneshot::channel();
            let session = Session::new(
                self.state.clone(),
                Backoff::new(
                    self.config.reconnect_interval_ms,
                    self.config.max_reconnect_delay_ms,
                ),
                self.config.max_reconnect_attempts,
                self.config.has_credentials(),
            );
            let driver = Driver::new(
                self.config.clone(),
                session,
                self.router.clone(),
                self.registry.clone(),
                cmd_rx,
                ready_tx,
            );
            let task = tokio::spawn(run_task(driver));
            *slot = Some(DriverHandle { cmd_tx, task });
            ready_rx
        };

        match ready_rx.await {
            Ok(result) => result,
            Err(_) => Err(WsError::Closed {
                code: None,
                reason: "Driver stopped before the session was ready".into(),
            }),
        }
    }

    /// Close with code 1000.
    pub async fn disconnect(&self) -> Result<(), WsError> {
        self.disconnect_with(1000, "Client disconnect").await
    }

    /// Close the connection and stop the driver. Safe from any state;
    /// any scheduled reconnect is cancelled with the driver task.
    pub async fn disconnect_with(&self, code: u16, reason: &str) -> Result<(), WsError> {
        let handle = self.driver.lock().await.take();
        if let Some(DriverHandle { cmd_tx, mut task }) = handle {
            let _ = cmd_tx
                .send(Command::Disconnect {
                    code,
                    reason: reason.to_string(),
                })
                .await;
            if tokio::time::timeout(DISCONNECT_JOIN_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                tracing::warn!("Driver did not stop in time, aborting");
                task.abort();
            }
        }
        self.registry.write().await.set_ready(false);
        self.state.store(SessionState::Disconnected);
        Ok(())
    }

    /// Send a raw outbound frame. Fails unless the session is ready.
    pub async fn send(&self, message: MessageOut) -> Result<(), WsError> {
        if !self.registry.read().await.is_ready() {
            return Err(WsError::NotConnected);
        }
        self.send_command(Command::Send(message)).await
    }

    async fn send_command(&self, command: Command) -> Result<(), WsError> {
        let cmd_tx = match self.driver.lock().await.as_ref() {
            Some(driver) => driver.cmd_tx.clone(),
            None => return Err(WsError::NotConnected),
        };
        cmd_tx
            .send(command)
            .await
            .map_err(|_| WsError::SendFailed("Driver stopped".into()))
    }

    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    pub fn is_connected(&self) -> bool {
        self.state.load().is_connected()
    }

    // ── Subscriptions ────────────────────────────────────────────────────

    /// Subscribe `channel` to `symbols`, or queue the request until ready.
    pub async fn subscribe(
        &self,
        channel: Channel,
        symbols: SymbolSet,
    ) -> Result<SubscribeOutcome, WsError> {
        let (message, outcome) = {
            let mut registry = self.registry.write().await;
            if !registry.is_ready() {
                registry.enqueue(channel, symbols);
                return Ok(SubscribeOutcome::Queued);
            }
            let admitted = registry.subscribe(channel, symbols);
            let admitted = match admitted {
                Ok(admitted) => admitted,
                Err(e) => {
                    drop(registry);
                    self.router.report_error(e.clone());
                    return Err(e);
                }
            };
            if admitted.added.is_empty() {
                if admitted.dropped.is_empty() {
                    return Ok(SubscribeOutcome::AlreadyActive);
                }
                drop(registry);
                let e = WsError::SubscriptionCapability {
                    channel: channel.wire_name().to_string(),
                    reason: format!("symbol limit reached, dropped {:?}", admitted.dropped),
                };
                self.router.report_error(e.clone());
                return Err(e);
            }
            (
                MessageOut::subscribe(channel, &admitted.added),
                SubscribeOutcome::Sent {
                    symbols: admitted.added.to_wire(),
                    dropped: admitted.dropped,
                },
            )
        };

        // Recorded as active; a lost frame is replayed on the next connect.
        if let Err(e) = self.send_command(Command::Send(message)).await {
            tracing::warn!("Subscribe frame not sent, will replay on reconnect: {}", e);
        }
        Ok(outcome)
    }

    /// Stop `channel` for `symbols` and evict their cached state.
    pub async fn unsubscribe(&self, channel: Channel, symbols: SymbolSet) -> Result<(), WsError> {
        let ready = {
            let mut registry = self.registry.write().await;
            let removed = registry.unsubscribe(channel, &symbols);
            if let Err(e) = removed {
                drop(registry);
                self.router.report_error(e.clone());
                return Err(e);
            }
            registry.is_ready()
        };
        if ready {
            self.send_command(Command::Send(MessageOut::unsubscribe(channel, &symbols)))
                .await?;
        }
        self.router.evict(channel, &symbols).await;
        Ok(())
    }

    pub async fn subscribe_tickers<I, S>(&self, symbols: I) -> Result<SubscribeOutcome, WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribe(Channel::Ticker, SymbolSet::from_symbols(symbols))
            .await
    }

    /// Full-book snapshots (at most 20 symbols, no `all`).
    pub async fn subscribe_orderbooks<I, S>(&self, symbols: I) -> Result<SubscribeOutcome, WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribe(Channel::L2Orderbook, SymbolSet::from_symbols(symbols))
            .await
    }

    /// Snapshot plus incremental diffs (at most 100 symbols, no `all`).
    pub async fn subscribe_orderbook_updates<I, S>(
        &self,
        symbols: I,
    ) -> Result<SubscribeOutcome, WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribe(Channel::L2Updates, SymbolSet::from_symbols(symbols))
            .await
    }

    pub async fn subscribe_trades<I, S>(&self, symbols: I) -> Result<SubscribeOutcome, WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribe(Channel::AllTrades, SymbolSet::from_symbols(symbols))
            .await
    }

    /// Account margins for every asset.
    pub async fn subscribe_balances(&self) -> Result<SubscribeOutcome, WsError> {
        self.subscribe(Channel::Margins, SymbolSet::All).await
    }

    pub async fn subscribe_positions<I, S>(&self, symbols: I) -> Result<SubscribeOutcome, WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribe(Channel::Positions, SymbolSet::from_symbols(symbols))
            .await
    }

    pub async fn subscribe_orders<I, S>(&self, symbols: I) -> Result<SubscribeOutcome, WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribe(Channel::Orders, SymbolSet::from_symbols(symbols))
            .await
    }

    pub async fn subscribe_user_trades<I, S>(
        &self,
        symbols: I,
    ) -> Result<SubscribeOutcome, WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subscribe(Channel::UserTrades, SymbolSet::from_symbols(symbols))
            .await
    }

    pub async fn unsubscribe_tickers<I, S>(&self, symbols: I) -> Result<(), WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unsubscribe(Channel::Ticker, SymbolSet::from_symbols(symbols))
            .await
    }

    pub async fn unsubscribe_orderbooks<I, S>(&self, symbols: I) -> Result<(), WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unsubscribe(Channel::L2Orderbook, SymbolSet::from_symbols(symbols))
            .await
    }

    pub async fn unsubscribe_orderbook_updates<I, S>(&self, symbols: I) -> Result<(), WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unsubscribe(Channel::L2Updates, SymbolSet::from_symbols(symbols))
            .await
    }

    pub async fn unsubscribe_trades<I, S>(&self, symbols: I) -> Result<(), WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unsubscribe(Channel::AllTrades, SymbolSet::from_symbols(symbols))
            .await
    }

    pub async fn unsubscribe_balances(&self) -> Result<(), WsError> {
        self.unsubscribe(Channel::Margins, SymbolSet::All).await
    }

    pub async fn unsubscribe_positions<I, S>(&self, symbols: I) -> Result<(), WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unsubscribe(Channel::Positions, SymbolSet::from_symbols(symbols))
            .await
    }

    pub async fn unsubscribe_orders<I, S>(&self, symbols: I) -> Result<(), WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unsubscribe(Channel::Orders, SymbolSet::from_symbols(symbols))
            .await
    }

    pub async fn unsubscribe_user_trades<I, S>(&self, symbols: I) -> Result<(), WsError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unsubscribe(Channel::UserTrades, SymbolSet::from_symbols(symbols))
            .await
    }

    /// Active symbols for `channel`.
    pub async fn active_subscriptions(&self, channel: Channel) -> Option<SymbolSet> {
        self.registry.read().await.active(channel).cloned()
    }

    // ── Cache reads ──────────────────────────────────────────────────────

    pub async fn get_ticker(&self, symbol: &str) -> Option<Ticker> {
        self.router.caches().read().await.get_ticker(symbol).cloned()
    }

    pub async fn all_tickers(&self) -> Vec<Ticker> {
        self.router.caches().read().await.all_tickers()
    }

    pub async fn get_orderbook(&self, symbol: &str) -> Option<OrderbookState> {
        self.router.caches().read().await.get_orderbook(symbol).cloned()
    }

    pub async fn all_orderbooks(&self) -> Vec<OrderbookState> {
        self.router.caches().read().await.all_orderbooks()
    }

    pub async fn get_balance(&self, asset_symbol: &str) -> Option<Balance> {
        self.router
            .caches()
            .read()
            .await
            .get_balance(asset_symbol)
            .cloned()
    }

    pub async fn all_balances(&self) -> Vec<Balance> {
        self.router.caches().read().await.all_balances()
    }

    pub async fn get_position(&self, symbol: &str) -> Option<Position> {
        self.router.caches().read().await.get_position(symbol).cloned()
    }

    pub async fn all_positions(&self) -> Vec<Position> {
        self.router.caches().read().await.all_positions()
    }

    pub async fn get_order(&self, id: &str) -> Option<Order> {
        self.router.caches().read().await.get_order(id).cloned()
    }

    pub async fn all_orders(&self) -> Vec<Order> {
        self.router.caches().read().await.all_orders()
    }

    /// Recent public trades, newest first.
    pub async fn get_trades(&self, symbol: &str) -> Vec<Trade> {
        self.router.caches().read().await.trades(symbol)
    }

    /// Recent own fills, newest first.
    pub async fn get_fills(&self, symbol: &str) -> Vec<Fill> {
        self.router.caches().read().await.fills(symbol)
    }

    pub async fn all_fills(&self) -> Vec<Fill> {
        self.router.caches().read().await.all_fills()
    }

    // ── Events & health ──────────────────────────────────────────────────

    /// A disposable event handle filtered to `topics` (empty = everything).
    pub fn events(&self, topics: &[Topic]) -> EventSubscription {
        self.router.events().subscribe(topics)
    }

    pub fn health(&self) -> HealthSnapshot {
        self.router.health().snapshot()
    }
}

impl Drop for DeltaStreamClient {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.task.abort();
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct DeltaStreamClientBuilder {
    config: StreamConfig,
}

impl DeltaStreamClientBuilder {
    /// Start from an existing config (e.g. `StreamConfig::from_env()`).
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = config;
        self
    }

    pub fn credentials(mut self, api_key: &str, api_secret: &str) -> Self {
        self.config.api_key = Some(api_key.to_string());
        self.config.api_secret = Some(api_secret.to_string());
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.config.environment = environment;
        self
    }

    /// Explicit URL; overrides `environment`.
    pub fn url(mut self, url: &str) -> Self {
        self.config.url = Some(url.to_string());
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.max_reconnect_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.config.heartbeat_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.config.auth_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    pub fn trade_history_size(mut self, size: usize) -> Self {
        self.config.trade_history_size = size;
        self
    }

    pub fn recent_errors_capacity(mut self, capacity: usize) -> Self {
        self.config.recent_errors_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<DeltaStreamClient, WsError> {
        DeltaStreamClient::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::WsEvent;

    fn client() -> DeltaStreamClient {
        DeltaStreamClient::builder()
            .url("ws://127.0.0.1:1")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_rejects_half_credentials() {
        let mut config = StreamConfig::default();
        config.api_key = Some("key".into());
        let result = DeltaStreamClient::builder().config(config).build();
        assert!(matches!(result, Err(WsError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_durations() {
        let client = DeltaStreamClient::builder()
            .environment(Environment::Testnet)
            .heartbeat_interval(Duration::from_secs(5))
            .auth_timeout(Duration::from_millis(2_500))
            .build()
            .unwrap();
        assert_eq!(client.config().heartbeat_interval_ms, 5_000);
        assert_eq!(client.config().auth_timeout_ms, 2_500);
        assert_eq!(client.config().ws_url(), crate::network::TESTNET_WS_URL);
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_subscribe_while_disconnected_queues() {
        let client = client();
        let outcome = client.subscribe_tickers(["BTCUSD"]).await.unwrap();
        assert_eq!(outcome, SubscribeOutcome::Queued);
        // Validation is deferred to replay, even for a private channel.
        let outcome = client.subscribe_orders(["BTCUSD"]).await.unwrap();
        assert_eq!(outcome, SubscribeOutcome::Queued);
        assert_eq!(client.registry.read().await.pending_len(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribe_while_disconnected_drops_queued_intent() {
        let client = client();
        client.subscribe_trades(["BTCUSD", "ETHUSD"]).await.unwrap();
        client.unsubscribe_trades(["BTCUSD", "ETHUSD"]).await.unwrap();
        assert_eq!(client.registry.read().await.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_symbol_unsubscribe_under_all_reports_error() {
        let client = client();
        let mut errors = client.events(&[Topic::Error]);
        client.subscribe_tickers(["all"]).await.unwrap();

        let err = tokio_test::assert_err!(client.unsubscribe_tickers(["BTCUSD"]).await);
        assert!(matches!(err, WsError::SubscriptionCapability { .. }));
        assert!(matches!(errors.try_recv(), Some(WsEvent::Error(WsError::SubscriptionCapability { .. }))));
        // The queued `all` request is untouched.
        assert_eq!(client.registry.read().await.pending_len(), 1);
    }

    #[tokio::test]
    async fn test_send_requires_ready_session() {
        let client = client();
        assert_eq!(client.send(MessageOut::Ping).await, Err(WsError::NotConnected));
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_budget() {
        let client = DeltaStreamClient::builder()
            .url("ws://127.0.0.1:1")
            .max_reconnect_attempts(1)
            .reconnect_interval(Duration::from_millis(10))
            .connection_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let mut events = client.events(&[Topic::Connection]);

        let err = tokio_test::assert_err!(client.connect().await);
        assert_eq!(err, WsError::ReconnectExhausted { attempts: 1 });
        assert!(err.is_terminal());
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(matches!(
            events.recv().await,
            Some(WsEvent::Reconnecting { attempt: 1, .. })
        ));
        let health = client.health();
        assert!(health
            .recent_errors
            .iter()
            .any(|e| e.error == WsError::ReconnectExhausted { attempts: 1 }));
    }

    #[tokio::test]
    async fn test_connect_during_backoff_is_not_connected() {
        let client = Arc::new(
            DeltaStreamClient::builder()
                .url("ws://127.0.0.1:1")
                .max_reconnect_attempts(5)
                .reconnect_interval(Duration::from_secs(30))
                .build()
                .unwrap(),
        );
        let first = tokio::spawn({
            let client = client.clone();
            async move { client.connect().await }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while client.state() != SessionState::Reconnecting {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(client.connect().await, Err(WsError::NotConnected));

        // Disconnect cancels the backoff and releases the first caller.
        tokio_test::assert_ok!(client.disconnect().await);
        assert_eq!(first.await.unwrap(), Err(WsError::NotConnected));
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_safe() {
        let client = client();
        tokio_test::assert_ok!(client.disconnect().await);
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_reads_on_empty_caches() {
        let client = client();
        assert!(client.get_ticker("BTCUSD").await.is_none());
        assert!(client.get_orderbook("BTCUSD").await.is_none());
        assert!(client.get_trades("BTCUSD").await.is_empty());
        assert!(client.all_positions().await.is_empty());
        assert!(!client.health().connected);
    }
}
