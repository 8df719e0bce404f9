//! Authentication for private WebSocket channels.
//!
//! # Authentication Flow
//!
//! 1. Build the challenge `method + timestamp + path` (`GET{unix_secs}/live`)
//! 2. Sign it with the API secret (HMAC-SHA256, hex encoded)
//! 3. Send `{"type":"auth","api_key":..,"signature":..,"timestamp":..}`
//! 4. Wait for the server's `auth` acknowledgement

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AuthError;
use crate::ws::MessageOut;

type HmacSha256 = Hmac<Sha256>;

/// HTTP method component of the signed challenge.
pub const AUTH_METHOD: &str = "GET";

/// Path component of the signed challenge.
pub const AUTH_PATH: &str = "/live";

/// API key + secret pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Build the signed auth message for the current time.
    pub fn auth_message(&self) -> Result<MessageOut, AuthError> {
        let timestamp = unix_timestamp_secs()?;
        self.auth_message_with_timestamp(timestamp)
    }

    /// Build the signed auth message for a specific timestamp (Unix seconds).
    pub fn auth_message_with_timestamp(&self, timestamp: u64) -> Result<MessageOut, AuthError> {
        let timestamp = timestamp.to_string();
        let payload = signature_payload(AUTH_METHOD, &timestamp, AUTH_PATH);
        let signature = sign(&self.api_secret, &payload)?;
        Ok(MessageOut::Auth {
            api_key: self.api_key.clone(),
            signature,
            timestamp,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

/// The string that gets signed: `method + timestamp + path`.
pub fn signature_payload(method: &str, timestamp: &str, path: &str) -> String {
    format!("{}{}{}", method, timestamp, path)
}

/// Hex-encoded HMAC-SHA256 of `payload` keyed by `secret`.
pub fn sign(secret: &str, payload: &str) -> Result<String, AuthError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::InvalidSecret(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn unix_timestamp_secs() -> Result<u64, AuthError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| AuthError::SystemTime("System time before UNIX epoch".to_string()))
}
