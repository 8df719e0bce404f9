//! Reconciled orderbook state — snapshot baseline plus incremental diffs.

use super::{BookAction, BookFrame, BookSide, PriceLevel};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Result of applying a frame to a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The frame mutated the book.
    Applied,
    /// A diff arrived before any snapshot and was ignored.
    NoSnapshot,
    /// A diff whose sequence number is not newer than the book's; ignored.
    Stale,
}

/// Live orderbook for one symbol.
///
/// Levels live in `BTreeMap`s keyed by price, so each side stays totally
/// ordered after every mutation and a diff costs O(log n) per affected level.
/// Levels with a non-positive size are never stored.
#[derive(Debug, Clone, Default)]
pub struct OrderbookState {
    pub symbol: String,
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    has_snapshot: bool,
    last_sequence: Option<u64>,
    checksum: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    sequence_gaps: u64,
}

impl OrderbookState {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Replace the book wholesale and establish the baseline for diffs.
    pub fn apply_snapshot(&mut self, bids: &[PriceLevel], asks: &[PriceLevel]) {
        self.bids.clear();
        self.asks.clear();
        apply_levels(&mut self.bids, bids);
        apply_levels(&mut self.asks, asks);
        self.has_snapshot = true;
        self.sequence_gaps = 0;
    }

    /// Merge level diffs. Size zero removes the level (a no-op when the price
    /// is absent); any other size inserts or replaces.
    pub fn apply_update(&mut self, bid_diffs: &[PriceLevel], ask_diffs: &[PriceLevel]) -> ApplyOutcome {
        if !self.has_snapshot {
            return ApplyOutcome::NoSnapshot;
        }
        apply_levels(&mut self.bids, bid_diffs);
        apply_levels(&mut self.asks, ask_diffs);
        ApplyOutcome::Applied
    }

    /// Apply a normalized frame, honoring sequence numbers when present.
    pub fn apply(&mut self, frame: &BookFrame) -> ApplyOutcome {
        match frame.action {
            BookAction::Snapshot => {
                self.apply_snapshot(&frame.bids, &frame.asks);
                self.last_sequence = frame.sequence_no;
            }
            BookAction::Update => {
                if !self.has_snapshot {
                    return ApplyOutcome::NoSnapshot;
                }
                if let (Some(seq), Some(last)) = (frame.sequence_no, self.last_sequence) {
                    if seq <= last {
                        tracing::debug!(
                            "Dropping stale book diff for {}: seq {} <= {}",
                            self.symbol,
                            seq,
                            last
                        );
                        return ApplyOutcome::Stale;
                    }
                }
                if let (Some(prev), Some(last)) = (frame.prev_sequence_no, self.last_sequence) {
                    if prev != last {
                        self.sequence_gaps += 1;
                        tracing::warn!(
                            "Sequence gap on {}: expected prev {}, received {}",
                            self.symbol,
                            last,
                            prev
                        );
                    }
                }
                self.apply_update(&frame.bids, &frame.asks);
                if frame.sequence_no.is_some() {
                    self.last_sequence = frame.sequence_no;
                }
            }
        }
        if frame.checksum.is_some() {
            self.checksum = frame.checksum.clone();
        }
        if frame.timestamp.is_some() {
            self.timestamp = frame.timestamp;
        }
        ApplyOutcome::Applied
    }

    // ── Reads ────────────────────────────────────────────────────────────

    /// Bids sorted by price descending.
    pub fn bids(&self) -> Vec<PriceLevel> {
        self.top_bids(usize::MAX)
    }

    /// Asks sorted by price ascending.
    pub fn asks(&self) -> Vec<PriceLevel> {
        self.top_asks(usize::MAX)
    }

    pub fn top_bids(&self, n: usize) -> Vec<PriceLevel> {
        self.bid_iter().take(n).collect()
    }

    pub fn top_asks(&self, n: usize) -> Vec<PriceLevel> {
        self.ask_iter().take(n).collect()
    }

    /// Highest bid.
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bid_iter().next()
    }

    /// Lowest ask.
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.ask_iter().next()
    }

    /// Average of best bid and best ask.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::from(2)),
            _ => None,
        }
    }

    /// Best ask minus best bid.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Spread as a percentage of the mid price.
    pub fn spread_pct(&self) -> Option<Decimal> {
        let mid = self.mid_price()?;
        if mid.is_zero() {
            return None;
        }
        Some(self.spread()? / mid * Decimal::from(100))
    }

    /// Total size across the best `levels` bids.
    pub fn bid_depth(&self, levels: usize) -> Decimal {
        self.bid_iter().take(levels).map(|l| l.size).sum()
    }

    /// Total size across the best `levels` asks.
    pub fn ask_depth(&self, levels: usize) -> Decimal {
        self.ask_iter().take(levels).map(|l| l.size).sum()
    }

    /// Volume-weighted average price for consuming `size` from `side`,
    /// walking from the best level outward. `None` when the side cannot fill
    /// the full size or `size` is not positive.
    pub fn vwap(&self, side: BookSide, size: Decimal) -> Option<Decimal> {
        if size <= Decimal::ZERO {
            return None;
        }
        let levels: Box<dyn Iterator<Item = PriceLevel> + '_> = match side {
            BookSide::Bid => Box::new(self.bid_iter()),
            BookSide::Ask => Box::new(self.ask_iter()),
        };

        let mut remaining = size;
        let mut notional = Decimal::ZERO;
        for level in levels {
            let take = remaining.min(level.size);
            notional += take * level.price;
            remaining -= take;
            if remaining.is_zero() {
                return Some(notional / size);
            }
        }
        None
    }

    pub fn bid_size_at(&self, price: Decimal) -> Option<Decimal> {
        self.bids.get(&price).copied()
    }

    pub fn ask_size_at(&self, price: Decimal) -> Option<Decimal> {
        self.asks.get(&price).copied()
    }

    pub fn bid_count(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_count(&self) -> usize {
        self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Whether a snapshot has established the baseline.
    pub fn has_snapshot(&self) -> bool {
        self.has_snapshot
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Checksum carried by the most recent frame, if any.
    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// Number of sequence gaps observed since the last snapshot.
    pub fn sequence_gaps(&self) -> u64 {
        self.sequence_gaps
    }

    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.has_snapshot = false;
        self.last_sequence = None;
        self.checksum = None;
        self.timestamp = None;
        self.sequence_gaps = 0;
    }

    fn bid_iter(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.bids.iter().rev().map(|(&p, &s)| PriceLevel::new(p, s))
    }

    fn ask_iter(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.asks.iter().map(|(&p, &s)| PriceLevel::new(p, s))
    }
}

fn apply_levels(side: &mut BTreeMap<Decimal, Decimal>, levels: &[PriceLevel]) {
    for level in levels {
        if level.size <= Decimal::ZERO {
            side.remove(&level.price);
        } else {
            side.insert(level.price, level.size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn lv(price: &str, size: &str) -> PriceLevel {
        PriceLevel::new(d(price), d(size))
    }

    fn seeded() -> OrderbookState {
        let mut book = OrderbookState::new("BTCUSD");
        book.apply_snapshot(
            &[lv("100", "1"), lv("99", "2"), lv("98", "3")],
            &[lv("101", "1.5"), lv("102", "2.5"), lv("103", "4")],
        );
        book
    }

    fn update(seq: Option<u64>, prev: Option<u64>, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> BookFrame {
        BookFrame {
            symbol: "BTCUSD".into(),
            action: BookAction::Update,
            bids,
            asks,
            sequence_no: seq,
            prev_sequence_no: prev,
            checksum: None,
            timestamp: None,
        }
    }

    #[test]
    fn test_snapshot_replaces_state() {
        let mut book = seeded();
        book.apply_snapshot(&[lv("90", "5")], &[lv("95", "6")]);
        assert_eq!(book.bid_count(), 1);
        assert_eq!(book.ask_count(), 1);
        assert_eq!(book.best_bid(), Some(lv("90", "5")));
        assert_eq!(book.best_ask(), Some(lv("95", "6")));
    }

    #[test]
    fn test_snapshot_skips_zero_levels() {
        let mut book = OrderbookState::new("BTCUSD");
        book.apply_snapshot(&[lv("100", "0"), lv("99", "1")], &[]);
        assert_eq!(book.bids(), vec![lv("99", "1")]);
    }

    #[test]
    fn test_update_before_snapshot_is_ignored() {
        let mut book = OrderbookState::new("BTCUSD");
        let outcome = book.apply_update(&[lv("100", "1")], &[]);
        assert_eq!(outcome, ApplyOutcome::NoSnapshot);
        assert!(book.is_empty());
    }

    #[test]
    fn test_update_inserts_replaces_and_removes() {
        let mut book = seeded();
        let outcome = book.apply_update(
            &[lv("100.5", "7"), lv("99", "9"), lv("98", "0")],
            &[lv("101", "0")],
        );
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(
            book.bids(),
            vec![lv("100.5", "7"), lv("100", "1"), lv("99", "9")]
        );
        assert_eq!(book.best_ask(), Some(lv("102", "2.5")));
    }

    #[test]
    fn test_removing_absent_price_is_noop() {
        let mut book = seeded();
        book.apply_update(&[lv("50", "0")], &[lv("500", "0")]);
        assert_eq!(book.bid_count(), 3);
        assert_eq!(book.ask_count(), 3);
    }

    #[test]
    fn test_all_zero_diff_empties_side() {
        let mut book = seeded();
        book.apply_update(&[lv("100", "0"), lv("99", "0"), lv("98", "0")], &[]);
        assert_eq!(book.bid_count(), 0);
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.ask_count(), 3);
    }

    #[test]
    fn test_derived_views() {
        let book = seeded();
        assert_eq!(book.mid_price(), Some(d("100.5")));
        assert_eq!(book.spread(), Some(d("1")));
        assert_eq!(book.spread_pct().unwrap().round_dp(6), d("0.995025"));
        assert_eq!(book.bid_depth(2), d("3"));
        assert_eq!(book.ask_depth(10), d("8"));
        assert_eq!(book.top_asks(1), vec![lv("101", "1.5")]);
    }

    #[test]
    fn test_vwap() {
        let book = seeded();
        // 1.5 @ 101 + 0.5 @ 102 = 202.5 / 2
        assert_eq!(book.vwap(BookSide::Ask, d("2")), Some(d("101.25")));
        assert_eq!(book.vwap(BookSide::Bid, d("1")), Some(d("100")));
        assert_eq!(book.vwap(BookSide::Bid, d("100")), None);
        assert_eq!(book.vwap(BookSide::Ask, Decimal::ZERO), None);
    }

    #[test]
    fn test_stale_sequence_dropped() {
        let mut book = OrderbookState::new("BTCUSD");
        book.apply(&BookFrame {
            action: BookAction::Snapshot,
            sequence_no: Some(10),
            ..update(None, None, vec![lv("100", "1")], vec![lv("101", "1")])
        });
        let outcome = book.apply(&update(Some(10), Some(9), vec![lv("100", "0")], vec![]));
        assert_eq!(outcome, ApplyOutcome::Stale);
        assert_eq!(book.bid_count(), 1);

        let outcome = book.apply(&update(Some(11), Some(10), vec![lv("100", "0")], vec![]));
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(book.bid_count(), 0);
        assert_eq!(book.last_sequence(), Some(11));
        assert_eq!(book.sequence_gaps(), 0);
    }

    #[test]
    fn test_sequence_gap_counted_but_applied() {
        let mut book = OrderbookState::new("BTCUSD");
        book.apply(&BookFrame {
            action: BookAction::Snapshot,
            sequence_no: Some(1),
            ..update(None, None, vec![], vec![])
        });
        let outcome = book.apply(&update(Some(5), Some(4), vec![lv("100", "1")], vec![]));
        assert_eq!(outcome, ApplyOutcome::Applied);
        assert_eq!(book.sequence_gaps(), 1);
        assert_eq!(book.best_bid(), Some(lv("100", "1")));
    }

    #[test]
    fn test_snapshot_resets_gap_count() {
        let mut book = OrderbookState::new("BTCUSD");
        let snapshot = |seq| BookFrame {
            action: BookAction::Snapshot,
            sequence_no: Some(seq),
            ..update(None, None, vec![lv("100", "1")], vec![])
        };
        book.apply(&snapshot(1));
        book.apply(&update(Some(5), Some(4), vec![], vec![]));
        assert_eq!(book.sequence_gaps(), 1);

        book.apply(&snapshot(20));
        assert_eq!(book.sequence_gaps(), 0);
        assert_eq!(book.last_sequence(), Some(20));
    }

    #[test]
    fn test_clear() {
        let mut book = seeded();
        book.clear();
        assert!(book.is_empty());
        assert!(!book.has_snapshot());
    }

    // ── Properties ───────────────────────────────────────────────────────

    fn level_strategy() -> impl Strategy<Value = PriceLevel> {
        // Small price domain so diffs frequently hit existing levels.
        (1i64..60, 0i64..5).prop_map(|(p, s)| PriceLevel::new(Decimal::new(p, 1), Decimal::from(s)))
    }

    fn levels_strategy() -> impl Strategy<Value = Vec<PriceLevel>> {
        prop::collection::vec(level_strategy(), 0..20)
    }

    fn assert_well_formed(book: &OrderbookState) {
        let bids = book.bids();
        let asks = book.asks();
        assert!(bids.windows(2).all(|w| w[0].price > w[1].price));
        assert!(asks.windows(2).all(|w| w[0].price < w[1].price));
        assert!(bids.iter().chain(asks.iter()).all(|l| l.size > Decimal::ZERO));
    }

    proptest! {
        #[test]
        fn prop_sides_stay_sorted_without_zero_levels(
            snap_bids in levels_strategy(),
            snap_asks in levels_strategy(),
            diffs in prop::collection::vec((levels_strategy(), levels_strategy()), 0..30),
        ) {
            let mut book = OrderbookState::new("PROP");
            book.apply_snapshot(&snap_bids, &snap_asks);
            assert_well_formed(&book);
            for (bids, asks) in &diffs {
                prop_assert_eq!(book.apply_update(bids, asks), ApplyOutcome::Applied);
                assert_well_formed(&book);
            }
        }

        #[test]
        fn prop_zeroing_every_level_empties_side(snap_bids in levels_strategy()) {
            let mut book = OrderbookState::new("PROP");
            book.apply_snapshot(&snap_bids, &[]);
            let zeroes: Vec<_> = book
                .bids()
                .into_iter()
                .map(|l| PriceLevel::new(l.price, Decimal::ZERO))
                .collect();
            book.apply_update(&zeroes, &[]);
            prop_assert_eq!(book.bid_count(), 0);
        }

        #[test]
        fn prop_last_write_wins_per_price(
            snap in levels_strategy(),
            diff in levels_strategy(),
        ) {
            let mut book = OrderbookState::new("PROP");
            book.apply_snapshot(&snap, &[]);
            book.apply_update(&diff, &[]);
            for level in &diff {
                let last = diff.iter().rev().find(|l| l.price == level.price).unwrap();
                if last.size.is_zero() {
                    prop_assert_eq!(book.bid_size_at(level.price), None);
                } else {
                    prop_assert_eq!(book.bid_size_at(level.price), Some(last.size));
                }
            }
        }
    }
}
