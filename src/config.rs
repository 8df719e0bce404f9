//! Client configuration.

use std::fmt;

use crate::auth::Credentials;
use crate::error::{SdkError, WsError};
use crate::network::Environment;

/// Trades (and fills) retained per symbol unless configured otherwise.
pub const DEFAULT_TRADE_HISTORY_SIZE: usize = 100;

/// Configuration for the streaming client.
#[derive(Clone)]
pub struct StreamConfig {
    /// API key for private channels. Authentication is skipped when unset.
    pub api_key: Option<String>,
    /// API secret used to sign the auth challenge.
    pub api_secret: Option<String>,
    /// Endpoint selection when `url` is not set.
    pub environment: Environment,
    /// Explicit WebSocket URL; overrides `environment`.
    pub url: Option<String>,
    /// Base delay for exponential reconnect backoff (ms).
    pub reconnect_interval_ms: u64,
    /// Reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Ceiling for the reconnect delay (ms).
    pub max_reconnect_delay_ms: u64,
    /// Interval between client pings (ms).
    pub heartbeat_interval_ms: u64,
    /// Grace window for a pong/heartbeat after a ping (ms).
    pub heartbeat_timeout_ms: u64,
    /// Timeout for opening the socket (ms).
    pub connection_timeout_ms: u64,
    /// Timeout for the auth acknowledgement (ms).
    pub auth_timeout_ms: u64,
    /// Capacity of the broadcast event bus.
    pub event_channel_capacity: usize,
    /// Capacity of the driver command channel.
    pub command_channel_capacity: usize,
    /// Trades (and fills) retained per symbol.
    pub trade_history_size: usize,
    /// Entries retained in the recent-errors log.
    pub recent_errors_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            environment: Environment::Production,
            url: None,
            reconnect_interval_ms: 1_000,
            max_reconnect_attempts: 10,
            max_reconnect_delay_ms: 30_000,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 10_000,
            connection_timeout_ms: 30_000,
            auth_timeout_ms: 10_000,
            event_channel_capacity: 1024,
            command_channel_capacity: 128,
            trade_history_size: DEFAULT_TRADE_HISTORY_SIZE,
            recent_errors_capacity: 50,
        }
    }
}

impl fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "***"))
            .field("environment", &self.environment)
            .field("url", &self.url)
            .field("reconnect_interval_ms", &self.reconnect_interval_ms)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("max_reconnect_delay_ms", &self.max_reconnect_delay_ms)
            .field("heartbeat_interval_ms", &self.heartbeat_interval_ms)
            .field("heartbeat_timeout_ms", &self.heartbeat_timeout_ms)
            .field("connection_timeout_ms", &self.connection_timeout_ms)
            .field("auth_timeout_ms", &self.auth_timeout_ms)
            .finish_non_exhaustive()
    }
}

impl StreamConfig {
    /// Build a config from `DELTA_API_KEY`, `DELTA_API_SECRET`, `DELTA_ENV`
    /// and `DELTA_WS_URL`. Missing variables keep their defaults.
    pub fn from_env() -> Result<Self, SdkError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SdkError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();
        config.api_key = var("DELTA_API_KEY");
        config.api_secret = var("DELTA_API_SECRET");
        if let Some(env) = var("DELTA_ENV") {
            config.environment = env.parse().map_err(WsError::InvalidConfig)?;
        }
        config.url = var("DELTA_WS_URL");
        config.validate()?;
        Ok(config)
    }

    /// The WebSocket URL to dial.
    pub fn ws_url(&self) -> &str {
        self.url
            .as_deref()
            .unwrap_or_else(|| self.environment.ws_url())
    }

    /// Credentials, when both key and secret are configured.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) => Some(Credentials::new(key.clone(), secret.clone())),
            _ => None,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() && self.api_secret.is_some()
    }

    /// Reject configurations the session cannot run with.
    pub fn validate(&self) -> Result<(), WsError> {
        if self.api_key.is_some() != self.api_secret.is_some() {
            return Err(WsError::InvalidConfig(
                "api_key and api_secret must be set together".into(),
            ));
        }
        let non_zero = [
            ("reconnect_interval_ms", self.reconnect_interval_ms),
            ("max_reconnect_delay_ms", self.max_reconnect_delay_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("heartbeat_timeout_ms", self.heartbeat_timeout_ms),
            ("connection_timeout_ms", self.connection_timeout_ms),
            ("auth_timeout_ms", self.auth_timeout_ms),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, v)| *v == 0) {
            return Err(WsError::InvalidConfig(format!("{} must be non-zero", name)));
        }
        if self.event_channel_capacity == 0
            || self.command_channel_capacity == 0
            || self.trade_history_size == 0
            || self.recent_errors_capacity == 0
        {
            return Err(WsError::InvalidConfig("capacities must be non-zero".into()));
        }
        if self.max_reconnect_delay_ms < self.reconnect_interval_ms {
            return Err(WsError::InvalidConfig(
                "max_reconnect_delay_ms must be >= reconnect_interval_ms".into(),
            ));
        }
        Ok(())
    }
}
