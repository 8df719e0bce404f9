//! Connection health counters and snapshots.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::WsError;
use crate::ws::{SessionState, StateCell};

/// An error with the time it was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedError {
    pub at: DateTime<Utc>,
    pub error: WsError,
}

/// Point-in-time view of connection health.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub connected: bool,
    pub authenticated: bool,
    pub state: SessionState,
    pub reconnect_attempts: u32,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub parse_errors: u64,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Oldest first.
    pub recent_errors: Vec<RecordedError>,
}

impl HealthSnapshot {
    /// Whether cached data should be treated as stale: not connected, or no
    /// message within `max_age`.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        if !self.connected {
            return true;
        }
        let Some(last) = self.last_message_at else {
            return true;
        };
        // An age too large for chrono never elapses.
        chrono::Duration::from_std(max_age)
            .map(|max_age| Utc::now().signed_duration_since(last) > max_age)
            .unwrap_or(false)
    }
}

/// Lock-free counters updated by the driver and router.
#[derive(Debug)]
pub struct HealthMonitor {
    state: StateCell,
    reconnect_attempts: AtomicU32,
    messages_received: AtomicU64,
    messages_sent: AtomicU64,
    parse_errors: AtomicU64,
    // Unix millis; 0 means never.
    last_heartbeat_ms: AtomicI64,
    last_message_ms: AtomicI64,
    recent_errors: Mutex<VecDeque<RecordedError>>,
    errors_capacity: usize,
}

impl HealthMonitor {
    pub fn new(state: StateCell, errors_capacity: usize) -> Self {
        Self {
            state,
            reconnect_attempts: AtomicU32::new(0),
            messages_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            last_heartbeat_ms: AtomicI64::new(0),
            last_message_ms: AtomicI64::new(0),
            recent_errors: Mutex::new(VecDeque::with_capacity(errors_capacity)),
            errors_capacity,
        }
    }

    #[inline]
    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.last_message_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    #[inline]
    pub fn record_message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_heartbeat(&self) {
        self.last_heartbeat_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    #[inline]
    pub fn set_reconnect_attempts(&self, attempts: u32) {
        self.reconnect_attempts.store(attempts, Ordering::Relaxed);
    }

    /// Append to the bounded recent-errors log, evicting the oldest.
    pub fn record_error(&self, error: WsError) {
        if self.errors_capacity == 0 {
            return;
        }
        let mut errors = self
            .recent_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if errors.len() >= self.errors_capacity {
            errors.pop_front();
        }
        errors.push_back(RecordedError {
            at: Utc::now(),
            error,
        });
    }

    pub fn parse_errors(&self) -> u64 {
        self.parse_errors.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let state = self.state.load();
        let recent_errors = self
            .recent_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        HealthSnapshot {
            connected: state.is_connected(),
            authenticated: state == SessionState::Authenticated,
            state,
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            last_heartbeat: millis_to_time(self.last_heartbeat_ms.load(Ordering::Relaxed)),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            last_message_at: millis_to_time(self.last_message_ms.load(Ordering::Relaxed)),
            recent_errors,
        }
    }
}

fn millis_to_time(ms: i64) -> Option<DateTime<Utc>> {
    if ms == 0 {
        None
    } else {
        DateTime::<Utc>::from_timestamp_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let monitor = HealthMonitor::new(StateCell::new(), 5);
        monitor.record_message_received();
        monitor.record_message_received();
        monitor.record_message_sent();
        monitor.record_parse_error();
        monitor.record_heartbeat();

        let snap = monitor.snapshot();
        assert_eq!(snap.messages_received, 2);
        assert_eq!(snap.messages_sent, 1);
        assert_eq!(snap.parse_errors, 1);
        assert!(snap.last_heartbeat.is_some());
        assert!(snap.last_message_at.is_some());
        assert!(!snap.connected);
    }

    #[test]
    fn test_recent_errors_bounded() {
        let monitor = HealthMonitor::new(StateCell::new(), 3);
        for i in 0..5 {
            monitor.record_error(WsError::MessageParse(format!("e{}", i)));
        }
        let errors = monitor.snapshot().recent_errors;
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].error, WsError::MessageParse("e2".into()));
        assert_eq!(errors[2].error, WsError::MessageParse("e4".into()));
    }

    #[test]
    fn test_state_flags_follow_cell() {
        let cell = StateCell::new();
        let monitor = HealthMonitor::new(cell.clone(), 5);
        cell.store(SessionState::Authenticated);
        let snap = monitor.snapshot();
        assert!(snap.connected);
        assert!(snap.authenticated);
    }

    #[test]
    fn test_is_stale() {
        let cell = StateCell::new();
        let monitor = HealthMonitor::new(cell.clone(), 5);
        assert!(monitor.snapshot().is_stale(Duration::from_secs(60)));

        cell.store(SessionState::Connected);
        assert!(monitor.snapshot().is_stale(Duration::from_secs(60)));

        monitor.record_message_received();
        assert!(!monitor.snapshot().is_stale(Duration::from_secs(60)));

        cell.store(SessionState::Reconnecting);
        assert!(monitor.snapshot().is_stale(Duration::from_secs(60)));
    }
}
