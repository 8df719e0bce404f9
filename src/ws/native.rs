//! Native WebSocket driver — `tokio-tungstenite`.
//!
//! One background task per client owns the socket and every timer:
//! - Heartbeat ping interval and pong deadline
//! - Auth deadline (in-loop, so pings and data keep flowing while waiting)
//! - Exponential reconnect backoff
//! - Subscription replay from the registry on every (re)connect
//!
//! All of them are `tokio::select!` arms of the same task, so a disconnect
//! command cancels them together.

use std::sync::Arc;
use std::time::Duration;

use async_lock::RwLock;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::auth::Credentials;
use crate::config::StreamConfig;
use crate::error::{AuthError, WsError};
use crate::health::HealthMonitor;
use crate::ws::router::{Control, MessageRouter};
use crate::ws::session::{CloseDecision, OpenAction, Session};
use crate::ws::subscriptions::SubscriptionRegistry;
use crate::ws::{MessageOut, WsEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

// ─── Commands from the facade to the driver ──────────────────────────────────

#[derive(Debug)]
pub(crate) enum Command {
    Send(MessageOut),
    Disconnect { code: u16, reason: String },
}

// ─── Why a connection ended ──────────────────────────────────────────────────

#[derive(Debug)]
enum DisconnectReason {
    UserRequested,
    Closed { code: Option<u16>, reason: String },
    HeartbeatTimeout,
    AuthFailed(WsError),
    Error(String),
}

// ─── Driver state ────────────────────────────────────────────────────────────

pub(crate) struct Driver {
    config: StreamConfig,
    credentials: Option<Credentials>,
    session: Session,
    router: MessageRouter,
    registry: Arc<RwLock<SubscriptionRegistry>>,
    cmd_rx: mpsc::Receiver<Command>,
    ready_tx: Option<oneshot::Sender<Result<(), WsError>>>,
}

impl Driver {
    pub(crate) fn new(
        config: StreamConfig,
        session: Session,
        router: MessageRouter,
        registry: Arc<RwLock<SubscriptionRegistry>>,
        cmd_rx: mpsc::Receiver<Command>,
        ready_tx: oneshot::Sender<Result<(), WsError>>,
    ) -> Self {
        Self {
            credentials: config.credentials(),
            config,
            session,
            router,
            registry,
            cmd_rx,
            ready_tx: Some(ready_tx),
        }
    }

    fn health(&self) -> &HealthMonitor {
        self.router.health()
    }

    /// Resolve the caller's pending `connect()`, once.
    fn report_ready(&mut self, result: Result<(), WsError>) {
        if let Some(tx) = self.ready_tx.take() {
            let _ = tx.send(result);
        }
    }

    /// Report a terminal error to the caller and consumers.
    fn fail(&mut self, error: WsError) {
        self.router.report_error(error.clone());
        self.report_ready(Err(error));
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

pub(crate) async fn run_task(mut driver: Driver) {
    loop {
        // ── 1. Attempt connection ────────────────────────────────────────
        driver.session.on_connecting();
        let url = driver.config.ws_url().to_string();
        let timeout = Duration::from_millis(driver.config.connection_timeout_ms);
        tracing::info!("Connecting to {}", url);

        let (sink, stream) = match attempt_connect(&url, timeout).await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!("WebSocket connection failed: {}", e);
                driver.router.report_error(e);
                let decision = driver.session.on_connect_failed();
                if schedule_reconnect(&mut driver, decision).await {
                    continue;
                }
                return;
            }
        };

        // ── 2. Connected ─────────────────────────────────────────────────
        let open = driver.session.on_open();
        driver.health().set_reconnect_attempts(0);
        driver.router.emit(WsEvent::Connected);
        tracing::info!("WebSocket connected");

        // ── 3. Inner select! loop ────────────────────────────────────────
        let reason = run_connected(&mut driver, sink, stream, open).await;

        // ── 4. Post-disconnect decision ──────────────────────────────────
        driver.registry.write().await.set_ready(false);

        match reason {
            DisconnectReason::UserRequested => {
                driver.session.on_disconnected();
                driver.router.emit(WsEvent::Disconnected {
                    code: Some(1000),
                    reason: "Client disconnect".into(),
                });
                driver.report_ready(Err(WsError::Closed {
                    code: Some(1000),
                    reason: "Disconnected before ready".into(),
                }));
                return;
            }
            DisconnectReason::AuthFailed(error) => {
                tracing::error!("Authentication failed: {}", error);
                driver.session.on_auth_failed();
                driver.router.emit(WsEvent::Disconnected {
                    code: Some(1000),
                    reason: error.to_string(),
                });
                driver.fail(error);
                return;
            }
            DisconnectReason::HeartbeatTimeout => {
                let error = WsError::HeartbeatTimeout {
                    timeout_ms: driver.config.heartbeat_timeout_ms,
                };
                tracing::warn!("{}", error);
                driver.router.emit(WsEvent::Disconnected {
                    code: None,
                    reason: "Heartbeat timeout".into(),
                });
                driver.router.report_error(error);
            }
            DisconnectReason::Closed { code, reason } => {
                tracing::warn!("Connection closed by server: {:?} {}", code, reason);
                driver.router.emit(WsEvent::Disconnected {
                    code,
                    reason: reason.clone(),
                });
                driver.router.report_error(WsError::Closed { code, reason });
            }
            DisconnectReason::Error(reason) => {
                tracing::error!("WebSocket error: {}", reason);
                driver.router.emit(WsEvent::Disconnected {
                    code: None,
                    reason: reason.clone(),
                });
                driver.router.report_error(WsError::ConnectionFailed(reason));
            }
        }

        let decision = driver.session.on_close();
        if !schedule_reconnect(&mut driver, decision).await {
            return;
        }
    }
}

/// Act on a close decision. Returns `true` when the loop should reconnect.
async fn schedule_reconnect(driver: &mut Driver, decision: CloseDecision) -> bool {
    match decision {
        CloseDecision::Reconnect { attempt, delay } => {
            driver.health().set_reconnect_attempts(attempt);
            let delay_ms = delay.as_millis() as u64;
            tracing::info!(
                "Reconnect attempt {}/{} in {}ms",
                attempt,
                driver.config.max_reconnect_attempts,
                delay_ms
            );
            driver
                .router
                .emit(WsEvent::Reconnecting { attempt, delay_ms });
            backoff_sleep(driver, delay).await
        }
        // The pending attempt already covers this trigger; it still waits
        // out its backoff.
        CloseDecision::AlreadyScheduled => {
            let delay = driver.session.pending_delay();
            tracing::debug!("Reconnect already scheduled, waiting {:?}", delay);
            backoff_sleep(driver, delay).await
        }
        CloseDecision::Exhausted { attempts } => {
            tracing::error!("Giving up after {} reconnect attempt(s)", attempts);
            driver.fail(WsError::ReconnectExhausted { attempts });
            false
        }
        CloseDecision::Stop => {
            driver.report_ready(Err(WsError::NotConnected));
            false
        }
    }
}

/// Sleep out the backoff while still honoring a disconnect. Subscribe frames
/// queued for the dead connection are dropped: the registry replays them.
async fn backoff_sleep(driver: &mut Driver, delay: Duration) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return true,
            cmd = driver.cmd_rx.recv() => match cmd {
                Some(Command::Send(msg)) => {
                    tracing::debug!("Dropping {:?} while reconnecting", msg);
                }
                Some(Command::Disconnect { .. }) | None => {
                    driver.session.begin_disconnect();
                    driver.session.on_disconnected();
                    driver.report_ready(Err(WsError::NotConnected));
                    return false;
                }
            }
        }
    }
}

/// The inner connected loop. Runs until the connection breaks.
async fn run_connected(
    driver: &mut Driver,
    mut sink: WsSink,
    mut stream: SplitStream<WsStream>,
    open: OpenAction,
) -> DisconnectReason {
    let ping_dur = Duration::from_millis(driver.config.heartbeat_interval_ms);
    let pong_dur = Duration::from_millis(driver.config.heartbeat_timeout_ms);
    let auth_dur = Duration::from_millis(driver.config.auth_timeout_ms);

    let mut ping_interval = tokio::time::interval(ping_dur);
    ping_interval.reset(); // skip immediate first tick

    // Deadlines park far in the future while inactive.
    let far_future = Instant::now() + Duration::from_secs(86400);
    let mut pong_deadline: Option<Instant> = None;
    let pong_sleep = tokio::time::sleep_until(far_future);
    tokio::pin!(pong_sleep);
    let mut auth_deadline: Option<Instant> = None;
    let auth_sleep = tokio::time::sleep_until(far_future);
    tokio::pin!(auth_sleep);

    // ── Handshake ────────────────────────────────────────────────────────
    match open {
        OpenAction::Authenticate => {
            let Some(credentials) = driver.credentials.clone() else {
                return DisconnectReason::AuthFailed(AuthError::MissingCredentials.into());
            };
            let msg = match credentials.auth_message() {
                Ok(msg) => msg,
                Err(e) => {
                    close_socket(&mut sink, "Authentication failed").await;
                    return DisconnectReason::AuthFailed(e.into());
                }
            };
            if let Err(e) = send_msg(&mut sink, &msg, driver.health()).await {
                return DisconnectReason::Error(e.to_string());
            }
            driver.session.on_auth_sent();
            tracing::debug!("Auth challenge sent, waiting for acknowledgement");
            let deadline = Instant::now() + auth_dur;
            auth_deadline = Some(deadline);
            auth_sleep.as_mut().reset(deadline);
        }
        OpenAction::Ready => {
            if let Err(e) = become_ready(driver, &mut sink).await {
                return DisconnectReason::Error(e.to_string());
            }
        }
    }

    loop {
        tokio::select! {
            // ── a) Incoming WS message ───────────────────────────────────
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let outcome = driver.router.route(text.as_str()).await;
                        for reply in &outcome.replies {
                            if let Err(e) = send_msg(&mut sink, reply, driver.health()).await {
                                tracing::warn!("Failed to send reply: {}", e);
                            }
                        }
                        match outcome.control {
                            Some(Control::Liveness) => {
                                pong_deadline = None;
                                pong_sleep.as_mut().reset(far_future);
                            }
                            Some(Control::Auth(result)) => {
                                if auth_deadline.is_none() {
                                    tracing::debug!("Ignoring auth ack outside of handshake");
                                    continue;
                                }
                                auth_deadline = None;
                                auth_sleep.as_mut().reset(far_future);
                                match result {
                                    Ok(()) => {
                                        driver.session.on_authenticated();
                                        driver.router.emit(WsEvent::Authenticated);
                                        tracing::info!("WebSocket authenticated");
                                        if let Err(e) = become_ready(driver, &mut sink).await {
                                            return DisconnectReason::Error(e.to_string());
                                        }
                                    }
                                    Err(reason) => {
                                        close_socket(&mut sink, "Authentication failed").await;
                                        return DisconnectReason::AuthFailed(
                                            WsError::AuthenticationFailed(reason),
                                        );
                                    }
                                }
                            }
                            None => {}
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            tracing::warn!("Failed to answer transport ping: {}", e);
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Transport-level pong, unrelated to the app heartbeat.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = extract_close(frame.as_ref());
                        return DisconnectReason::Closed { code: Some(code), reason };
                    }
                    Some(Ok(_)) => {} // Binary, Frame
                    Some(Err(e)) => return DisconnectReason::Error(e.to_string()),
                    None => return DisconnectReason::Error("Stream ended".into()),
                }
            }

            // ── b) Command from the facade ───────────────────────────────
            cmd = driver.cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(msg)) => {
                        if let Err(e) = send_msg(&mut sink, &msg, driver.health()).await {
                            tracing::warn!("Send failed: {}", e);
                            driver.router.report_error(e);
                        }
                    }
                    Some(Command::Disconnect { code, reason }) => {
                        driver.session.begin_disconnect();
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        }))).await;
                        return DisconnectReason::UserRequested;
                    }
                    None => {
                        // Client dropped
                        driver.session.begin_disconnect();
                        return DisconnectReason::UserRequested;
                    }
                }
            }

            // ── c) Heartbeat ping ────────────────────────────────────────
            _ = ping_interval.tick() => {
                match send_msg(&mut sink, &MessageOut::Ping, driver.health()).await {
                    Ok(()) => {
                        if pong_deadline.is_none() {
                            let deadline = Instant::now() + pong_dur;
                            pong_deadline = Some(deadline);
                            pong_sleep.as_mut().reset(deadline);
                        }
                    }
                    Err(e) => tracing::warn!("Failed to send ping: {}", e),
                }
            }

            // ── d) Pong deadline ─────────────────────────────────────────
            () = &mut pong_sleep, if pong_deadline.is_some() => {
                tracing::warn!(
                    "Heartbeat timeout: no pong within {}ms",
                    driver.config.heartbeat_timeout_ms
                );
                let _ = sink.close().await;
                return DisconnectReason::HeartbeatTimeout;
            }

            // ── e) Auth deadline ─────────────────────────────────────────
            () = &mut auth_sleep, if auth_deadline.is_some() => {
                close_socket(&mut sink, "Authentication timeout").await;
                return DisconnectReason::AuthFailed(WsError::AuthenticationTimeout {
                    timeout_ms: driver.config.auth_timeout_ms,
                });
            }
        }
    }
}

/// Flush queued intent and replay every active subscription, then open the
/// registry to direct sends.
async fn become_ready(driver: &mut Driver, sink: &mut WsSink) -> Result<(), WsError> {
    let plan = {
        let mut registry = driver.registry.write().await;
        let plan = registry.replay_plan();
        registry.set_ready(true);
        plan
    };

    for error in plan.rejected {
        driver.router.report_error(error);
    }
    for frame in &plan.frames {
        send_msg(sink, frame, driver.health()).await?;
    }

    driver.report_ready(Ok(()));
    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Open the socket within `timeout`.
async fn attempt_connect(
    url: &str,
    timeout: Duration,
) -> Result<(WsSink, SplitStream<WsStream>), WsError> {
    let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| WsError::ConnectionFailed("Connection timeout".into()))?
        .map_err(|e| match WsError::from(e) {
            failed @ WsError::ConnectionFailed(_) => failed,
            other => WsError::ConnectionFailed(other.to_string()),
        })?;

    Ok(ws_stream.split())
}

/// Serialize and send a MessageOut over the sink.
async fn send_msg(sink: &mut WsSink, msg: &MessageOut, health: &HealthMonitor) -> Result<(), WsError> {
    let json = serde_json::to_string(msg).map_err(|e| WsError::SendFailed(e.to_string()))?;
    sink.send(Message::Text(json.into())).await?;
    health.record_message_sent();
    Ok(())
}

async fn close_socket(sink: &mut WsSink, reason: &str) {
    let _ = sink
        .send(Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: reason.to_string().into(),
        })))
        .await;
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1005, "No close frame".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_close_with_frame() {
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "maintenance".into(),
        };
        let (code, reason) = extract_close(Some(&frame));
        assert_eq!(code, 1001);
        assert_eq!(reason, "maintenance");
    }

    #[test]
    fn test_extract_close_no_frame() {
        let (code, reason) = extract_close(None);
        assert_eq!(code, 1005);
        assert_eq!(reason, "No close frame");
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_failed() {
        let result = attempt_connect("ws://127.0.0.1:1", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(WsError::ConnectionFailed(_))));
    }
}
