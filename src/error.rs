//! Unified SDK error types.

use thiserror::Error;

/// Top-level SDK error.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("WebSocket error: {0}")]
    Ws(#[from] WsError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// WebSocket session errors.
///
/// `Clone` so the same value can be fanned out on the event bus and kept in
/// the recent-errors log.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WsError {
    /// The socket could not be created or opened.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The server rejected the signed auth challenge.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No auth acknowledgement within the configured timeout.
    #[error("Authentication timed out after {timeout_ms}ms")]
    AuthenticationTimeout { timeout_ms: u64 },

    /// The channel does not support the requested mode. Non-fatal.
    #[error("Subscription rejected for {channel}: {reason}")]
    SubscriptionCapability { channel: String, reason: String },

    /// Malformed inbound frame. Discarded, counted, never fatal.
    #[error("Failed to parse message: {0}")]
    MessageParse(String),

    /// Reconnect attempts exhausted. Terminal for the session.
    #[error("Reconnect attempts exhausted after {attempts} attempt(s)")]
    ReconnectExhausted { attempts: u32 },

    #[error("Heartbeat timeout: no liveness signal within {timeout_ms}ms")]
    HeartbeatTimeout { timeout_ms: u64 },

    #[error("Connection closed: code={code:?} reason={reason}")]
    Closed { code: Option<u16>, reason: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Send failed: {0}")]
    SendFailed(String),

    /// An `error` frame sent by the exchange.
    #[error("Server error: {message} (code: {code:?})")]
    Server { code: Option<String>, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl WsError {
    /// Whether the error ends the session (no automatic recovery follows).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WsError::AuthenticationFailed(_)
                | WsError::AuthenticationTimeout { .. }
                | WsError::ReconnectExhausted { .. }
        )
    }
}

#[cfg(feature = "ws-native")]
impl From<tokio_tungstenite::tungstenite::Error> for WsError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::ConnectionClosed => WsError::Closed {
                code: Some(1000),
                reason: "Connection closed normally".to_string(),
            },
            Error::AlreadyClosed => WsError::NotConnected,
            Error::Io(e) => WsError::ConnectionFailed(e.to_string()),
            Error::Url(e) => WsError::ConnectionFailed(format!("Invalid URL: {}", e)),
            Error::Http(resp) => {
                WsError::ConnectionFailed(format!("HTTP error: {:?}", resp.status()))
            }
            Error::HttpFormat(e) => WsError::ConnectionFailed(e.to_string()),
            other => WsError::SendFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for WsError {
    fn from(err: serde_json::Error) -> Self {
        WsError::MessageParse(err.to_string())
    }
}

/// Authentication errors raised while building the signed challenge.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Missing credentials")]
    MissingCredentials,

    #[error("Invalid API secret: {0}")]
    InvalidSecret(String),

    #[error("System time error: {0}")]
    SystemTime(String),
}

impl From<AuthError> for WsError {
    fn from(err: AuthError) -> Self {
        WsError::AuthenticationFailed(err.to_string())
    }
}
