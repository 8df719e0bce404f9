//! Transport session state machine.
//!
//! Sans-IO: the driver reports socket events and acts on the returned
//! decisions. Keeping the transitions here makes the reconnect and backoff
//! rules testable without a socket.

use std::time::Duration;

use super::{SessionState, StateCell};

// ─── Backoff ─────────────────────────────────────────────────────────────────

/// Exponential reconnect delay: `min(base * 2^(attempt-1), cap)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base_ms: u64,
    pub cap_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, cap_ms: u64) -> Self {
        Self { base_ms, cap_ms }
    }

    /// Delay before the given 1-based attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63);
        let factor = 1u64.checked_shl(exp).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_ms.saturating_mul(factor).min(self.cap_ms))
    }
}

// ─── Decisions ───────────────────────────────────────────────────────────────

/// What to do once the socket is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAction {
    /// Send the signed challenge and wait for the ack before replaying.
    Authenticate,
    /// No credentials; replay subscriptions right away.
    Ready,
}

/// What to do after the connection is lost or could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    Reconnect { attempt: u32, delay: Duration },
    /// A reconnect is already pending; this trigger collapses into it.
    AlreadyScheduled,
    /// The attempt budget is spent.
    Exhausted { attempts: u32 },
    /// The user asked to disconnect.
    Stop,
}

// ─── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Session {
    state: StateCell,
    backoff: Backoff,
    max_attempts: u32,
    has_credentials: bool,
    attempts: u32,
    reconnect_scheduled: bool,
    user_closing: bool,
}

impl Session {
    pub fn new(state: StateCell, backoff: Backoff, max_attempts: u32, has_credentials: bool) -> Self {
        Self {
            state,
            backoff,
            max_attempts,
            has_credentials,
            attempts: 0,
            reconnect_scheduled: false,
            user_closing: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    /// Reconnect attempts since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Ready for application traffic: open, and authenticated when
    /// credentials are configured.
    pub fn is_ready(&self) -> bool {
        match self.state() {
            SessionState::Authenticated => true,
            SessionState::Connected => !self.has_credentials,
            _ => false,
        }
    }

    /// Backoff for the reconnect already scheduled by the last close.
    pub fn pending_delay(&self) -> Duration {
        self.backoff.delay(self.attempts.max(1))
    }

    pub fn is_user_closing(&self) -> bool {
        self.user_closing
    }

    /// A connection attempt is starting.
    pub fn on_connecting(&mut self) {
        self.reconnect_scheduled = false;
        self.state.store(SessionState::Connecting);
    }

    /// Socket open. Resets the attempt counter.
    pub fn on_open(&mut self) -> OpenAction {
        self.attempts = 0;
        self.reconnect_scheduled = false;
        self.state.store(SessionState::Connected);
        if self.has_credentials {
            OpenAction::Authenticate
        } else {
            OpenAction::Ready
        }
    }

    pub fn on_auth_sent(&mut self) {
        self.state.store(SessionState::Authenticating);
    }

    pub fn on_authenticated(&mut self) {
        self.state.store(SessionState::Authenticated);
    }

    /// Auth rejected or timed out. Terminal: no reconnect follows.
    pub fn on_auth_failed(&mut self) {
        self.reconnect_scheduled = false;
        self.state.store(SessionState::Disconnected);
    }

    /// The connection was lost (close frame, socket error, heartbeat timeout).
    pub fn on_close(&mut self) -> CloseDecision {
        if self.user_closing {
            self.state.store(SessionState::Disconnected);
            return CloseDecision::Stop;
        }
        if self.reconnect_scheduled {
            return CloseDecision::AlreadyScheduled;
        }
        if self.attempts >= self.max_attempts {
            self.state.store(SessionState::Disconnected);
            return CloseDecision::Exhausted {
                attempts: self.attempts,
            };
        }
        self.attempts += 1;
        self.reconnect_scheduled = true;
        self.state.store(SessionState::Reconnecting);
        CloseDecision::Reconnect {
            attempt: self.attempts,
            delay: self.backoff.delay(self.attempts),
        }
    }

    /// Opening the socket failed. Same policy as a lost connection.
    pub fn on_connect_failed(&mut self) -> CloseDecision {
        self.on_close()
    }

    /// `disconnect()` was called. Suppresses any scheduled reconnect.
    pub fn begin_disconnect(&mut self) {
        self.user_closing = true;
        self.reconnect_scheduled = false;
        self.state.store(SessionState::Closing);
    }

    pub fn on_disconnected(&mut self) {
        self.reconnect_scheduled = false;
        self.state.store(SessionState::Disconnected);
    }
}
