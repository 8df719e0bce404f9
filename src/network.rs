//! Network URL constants for the Delta Exchange streaming API.

use std::str::FromStr;

/// Production WebSocket URL.
pub const PRODUCTION_WS_URL: &str = "wss://socket.india.delta.exchange";

/// Testnet WebSocket URL.
pub const TESTNET_WS_URL: &str = "wss://socket-ind.testnet.deltaex.org";

/// Default WebSocket URL.
pub const DEFAULT_WS_URL: &str = PRODUCTION_WS_URL;

/// Exchange environment selecting the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Production,
    Testnet,
}

impl Environment {
    pub fn ws_url(&self) -> &'static str {
        match self {
            Environment::Production => PRODUCTION_WS_URL,
            Environment::Testnet => TESTNET_WS_URL,
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" | "mainnet" => Ok(Environment::Production),
            "testnet" | "test" => Ok(Environment::Testnet),
            other => Err(format!("Unknown environment: {}", other)),
        }
    }
}
