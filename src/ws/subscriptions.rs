//! Channel capabilities, subscription tracking, and reconnect replay.
//!
//! The registry is the single record of subscription intent. Requests made
//! while the session is not ready are queued; on every (re)connect the queue
//! is flushed into the active set and the whole active set is replayed as one
//! subscribe frame per channel.

use crate::error::WsError;
use crate::ws::MessageOut;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::str::FromStr;

/// Wildcard symbol accepted by channels that support "every product".
pub const ALL_SYMBOLS: &str = "all";

// ─── Channel ─────────────────────────────────────────────────────────────────

/// A logical data channel multiplexed over the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Ticker,
    L2Orderbook,
    L2Updates,
    AllTrades,
    Margins,
    Positions,
    Orders,
    UserTrades,
}

impl Channel {
    pub const ALL: [Channel; 8] = [
        Channel::Ticker,
        Channel::L2Orderbook,
        Channel::L2Updates,
        Channel::AllTrades,
        Channel::Margins,
        Channel::Positions,
        Channel::Orders,
        Channel::UserTrades,
    ];

    pub fn wire_name(&self) -> &'static str {
        match self {
            Channel::Ticker => "v2/ticker",
            Channel::L2Orderbook => "l2_orderbook",
            Channel::L2Updates => "l2_updates",
            Channel::AllTrades => "all_trades",
            Channel::Margins => "margins",
            Channel::Positions => "positions",
            Channel::Orders => "orders",
            Channel::UserTrades => "v2/user_trades",
        }
    }

    /// Whether the channel accepts the `all` sentinel.
    pub fn supports_all(&self) -> bool {
        !matches!(self, Channel::L2Orderbook | Channel::L2Updates)
    }

    /// Maximum number of symbols per connection, if capped.
    pub fn max_symbols(&self) -> Option<usize> {
        match self {
            Channel::L2Orderbook => Some(20),
            Channel::L2Updates => Some(100),
            _ => None,
        }
    }

    /// Whether the channel needs an authenticated session.
    pub fn is_private(&self) -> bool {
        matches!(
            self,
            Channel::Margins | Channel::Positions | Channel::Orders | Channel::UserTrades
        )
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v2/ticker" | "v2_ticker" => Ok(Channel::Ticker),
            other => Channel::ALL
                .into_iter()
                .find(|c| c.wire_name() == other)
                .ok_or_else(|| format!("Unknown channel: {}", other)),
        }
    }
}

// ─── SymbolSet ───────────────────────────────────────────────────────────────

/// Symbols of one subscription: either every product or an ordered set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolSet {
    All,
    Symbols(BTreeSet<String>),
}

impl SymbolSet {
    /// Build from caller input. Any `"all"` entry selects every product.
    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for symbol in symbols {
            let symbol = symbol.into();
            let symbol = symbol.trim();
            if symbol.eq_ignore_ascii_case(ALL_SYMBOLS) {
                return SymbolSet::All;
            }
            if !symbol.is_empty() {
                set.insert(symbol.to_string());
            }
        }
        SymbolSet::Symbols(set)
    }

    pub fn is_all(&self) -> bool {
        matches!(self, SymbolSet::All)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, SymbolSet::Symbols(s) if s.is_empty())
    }

    pub fn contains(&self, symbol: &str) -> bool {
        match self {
            SymbolSet::All => true,
            SymbolSet::Symbols(s) => s.contains(symbol),
        }
    }

    /// Symbols as sent on the wire.
    pub fn to_wire(&self) -> Vec<String> {
        match self {
            SymbolSet::All => vec![ALL_SYMBOLS.to_string()],
            SymbolSet::Symbols(s) => s.iter().cloned().collect(),
        }
    }
}

// ─── Wire payload ────────────────────────────────────────────────────────────

/// `{"name":..,"symbols":[..]}` entry of a subscribe/unsubscribe payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    #[serde(default)]
    pub symbols: Vec<String>,
}

/// `payload` of a subscribe/unsubscribe frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionPayload {
    pub channels: Vec<ChannelSpec>,
}

impl SubscriptionPayload {
    pub fn single(channel: Channel, symbols: &SymbolSet) -> Self {
        Self {
            channels: vec![ChannelSpec {
                name: channel.wire_name().to_string(),
                symbols: symbols.to_wire(),
            }],
        }
    }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of a subscribe call on the facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// Session not ready; the request replays on the next connect.
    Queued,
    /// Every requested symbol was already active; nothing was sent.
    AlreadyActive,
    /// A subscribe frame was sent for `symbols`. `dropped` lists symbols cut
    /// by the channel's symbol cap.
    Sent {
        symbols: Vec<String>,
        dropped: Vec<String>,
    },
}

/// A validated request that the registry recorded as active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admitted {
    /// Newly active symbols (what goes on the wire).
    pub added: SymbolSet,
    /// Symbols cut by the channel's cap.
    pub dropped: Vec<String>,
}

/// Frames to send after a (re)connect, plus requests that failed validation.
#[derive(Debug, Clone, Default)]
pub struct ReplayPlan {
    pub frames: Vec<MessageOut>,
    pub rejected: Vec<WsError>,
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Subscription intent that survives reconnects.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    pending: VecDeque<(Channel, SymbolSet)>,
    active: BTreeMap<Channel, SymbolSet>,
    has_credentials: bool,
    ready: bool,
}

impl SubscriptionRegistry {
    pub fn new(has_credentials: bool) -> Self {
        Self {
            has_credentials,
            ..Default::default()
        }
    }

    /// Whether frames can go straight to the socket.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub(crate) fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Queue a request for the next replay.
    pub fn enqueue(&mut self, channel: Channel, symbols: SymbolSet) {
        tracing::debug!("Queueing {} subscription until ready: {:?}", channel, symbols);
        self.pending.push_back((channel, symbols));
    }

    /// Validate a request and record it as active.
    ///
    /// Rejects `all` on channels that do not accept it and private channels
    /// without credentials. Channels with a symbol cap keep only as many new
    /// symbols as fit; the rest are reported in `dropped`.
    pub fn subscribe(&mut self, channel: Channel, symbols: SymbolSet) -> Result<Admitted, WsError> {
        if symbols.is_empty() {
            return Err(capability(channel, "no symbols requested"));
        }
        if symbols.is_all() && !channel.supports_all() {
            return Err(capability(channel, "channel does not accept \"all\""));
        }
        if channel.is_private() && !self.has_credentials {
            return Err(capability(channel, "private channel requires credentials"));
        }

        let requested = match symbols {
            SymbolSet::All => {
                let already = self.active.get(&channel).is_some_and(SymbolSet::is_all);
                self.active.insert(channel, SymbolSet::All);
                tracing::debug!("Tracking subscription: {} all", channel);
                return Ok(Admitted {
                    added: if already {
                        SymbolSet::Symbols(BTreeSet::new())
                    } else {
                        SymbolSet::All
                    },
                    dropped: Vec::new(),
                });
            }
            SymbolSet::Symbols(requested) => requested,
        };

        let entry = self
            .active
            .entry(channel)
            .or_insert_with(|| SymbolSet::Symbols(BTreeSet::new()));
        let current = match entry {
            SymbolSet::All => {
                return Ok(Admitted {
                    added: SymbolSet::Symbols(BTreeSet::new()),
                    dropped: Vec::new(),
                })
            }
            SymbolSet::Symbols(current) => current,
        };

        let fresh: Vec<String> = requested
            .into_iter()
            .filter(|s| !current.contains(s))
            .collect();
        let room = channel
            .max_symbols()
            .map(|max| max.saturating_sub(current.len()))
            .unwrap_or(usize::MAX);

        let (kept, dropped) = if fresh.len() > room {
            let (kept, dropped) = fresh.split_at(room);
            tracing::warn!(
                "{} allows at most {} symbols; dropping {:?}",
                channel,
                channel.max_symbols().unwrap_or_default(),
                dropped
            );
            (kept.to_vec(), dropped.to_vec())
        } else {
            (fresh, Vec::new())
        };

        current.extend(kept.iter().cloned());
        if current.is_empty() {
            self.active.remove(&channel);
        }
        if !kept.is_empty() {
            tracing::debug!("Tracking subscription: {} {:?}", channel, kept);
        }

        Ok(Admitted {
            added: SymbolSet::Symbols(kept.into_iter().collect()),
            dropped,
        })
    }

    /// Remove symbols from active tracking and the pending queue.
    /// Unsubscribing `all` drops the whole channel.
    ///
    /// Individual symbols cannot be carved out of an `all` subscription: the
    /// request is rejected and nothing changes.
    pub fn unsubscribe(&mut self, channel: Channel, symbols: &SymbolSet) -> Result<(), WsError> {
        if !symbols.is_all() && self.holds_all(channel) {
            return Err(capability(
                channel,
                "cannot unsubscribe individual symbols from an \"all\" subscription",
            ));
        }
        match symbols {
            SymbolSet::All => {
                self.active.remove(&channel);
                self.pending.retain(|(c, _)| *c != channel);
            }
            SymbolSet::Symbols(remove) => {
                if let Some(SymbolSet::Symbols(current)) = self.active.get_mut(&channel) {
                    current.retain(|s| !remove.contains(s));
                    if current.is_empty() {
                        self.active.remove(&channel);
                    }
                }
                for (c, queued) in self.pending.iter_mut() {
                    if *c == channel {
                        if let SymbolSet::Symbols(q) = queued {
                            q.retain(|s| !remove.contains(s));
                        }
                    }
                }
                self.pending
                    .retain(|(c, queued)| *c != channel || !queued.is_empty());
            }
        }
        tracing::debug!("Removed {} subscription(s): {:?}", channel, symbols);
        Ok(())
    }

    /// Whether `channel` is subscribed, or queued, as `all`.
    fn holds_all(&self, channel: Channel) -> bool {
        self.active.get(&channel).is_some_and(SymbolSet::is_all)
            || self
                .pending
                .iter()
                .any(|(c, symbols)| *c == channel && symbols.is_all())
    }

    /// Flush the pending queue into the active set and build one subscribe
    /// frame per active channel. Each (channel, symbol) pair appears once.
    pub fn replay_plan(&mut self) -> ReplayPlan {
        let mut plan = ReplayPlan::default();

        while let Some((channel, symbols)) = self.pending.pop_front() {
            if let Err(e) = self.subscribe(channel, symbols) {
                tracing::warn!("Dropping queued subscription: {}", e);
                plan.rejected.push(e);
            }
        }

        plan.frames = self
            .active
            .iter()
            .filter(|(_, symbols)| !symbols.is_empty())
            .map(|(channel, symbols)| MessageOut::subscribe(*channel, symbols))
            .collect();

        if !plan.frames.is_empty() {
            tracing::info!("Replaying {} channel subscription(s)", plan.frames.len());
        }
        plan
    }

    /// Active symbols for a channel.
    pub fn active(&self, channel: Channel) -> Option<&SymbolSet> {
        self.active.get(&channel)
    }

    /// All active (channel, symbols) pairs.
    pub fn active_channels(&self) -> impl Iterator<Item = (Channel, &SymbolSet)> {
        self.active.iter().map(|(c, s)| (*c, s))
    }

    pub fn is_subscribed(&self, channel: Channel, symbol: &str) -> bool {
        self.active
            .get(&channel)
            .is_some_and(|set| set.contains(symbol))
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn capability(channel: Channel, reason: &str) -> WsError {
    WsError::SubscriptionCapability {
        channel: channel.wire_name().to_string(),
        reason: reason.to_string(),
    }
}
