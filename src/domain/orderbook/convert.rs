//! Conversions from wire frames to normalized `BookFrame`s.

use super::wire::{L2Orderbook, L2Update, WireLevel};
use super::{BookAction, BookFrame, PriceLevel};

impl From<&WireLevel> for PriceLevel {
    fn from(level: &WireLevel) -> Self {
        match level {
            WireLevel::Pair(price, size) => PriceLevel::new(*price, *size),
            WireLevel::Object { price, size } => PriceLevel::new(*price, *size),
        }
    }
}

fn levels(wire: &[WireLevel]) -> Vec<PriceLevel> {
    wire.iter().map(PriceLevel::from).collect()
}

impl From<L2Orderbook> for BookFrame {
    fn from(book: L2Orderbook) -> Self {
        Self {
            bids: levels(&book.buy),
            asks: levels(&book.sell),
            symbol: book.symbol,
            action: BookAction::Snapshot,
            sequence_no: book.last_sequence_no,
            prev_sequence_no: None,
            checksum: None,
            timestamp: book.timestamp,
        }
    }
}

impl From<L2Update> for BookFrame {
    fn from(update: L2Update) -> Self {
        let action = if update.action.eq_ignore_ascii_case("snapshot") {
            BookAction::Snapshot
        } else {
            BookAction::Update
        };
        Self {
            bids: levels(&update.bids),
            asks: levels(&update.asks),
            symbol: update.symbol,
            action,
            sequence_no: update.sequence_no,
            prev_sequence_no: update.prev_sequence_no,
            checksum: update.checksum,
            timestamp: update.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_l2_orderbook_object_levels() {
        let wire: L2Orderbook = serde_json::from_str(
            r#"{"symbol":"BTCUSD","buy":[{"limit_price":"59000.5","size":100,"depth":"100"}],
                "sell":[{"limit_price":"59001","size":"40","depth":"40"}],
                "last_sequence_no":6435,"timestamp":1671014416145000}"#,
        )
        .unwrap();
        let frame = BookFrame::from(wire);
        assert_eq!(frame.action, BookAction::Snapshot);
        assert_eq!(frame.bids, vec![PriceLevel::new(d("59000.5"), d("100"))]);
        assert_eq!(frame.asks, vec![PriceLevel::new(d("59001"), d("40"))]);
        assert_eq!(frame.sequence_no, Some(6435));
    }

    #[test]
    fn test_l2_update_pair_levels() {
        let wire: L2Update = serde_json::from_str(
            r#"{"symbol":"ETHUSD","action":"update","bids":[["3000.1","0"]],
                "asks":[["3001","12"]],"sequence_no":11,"prev_sequence_no":10,"cs":2815010497}"#,
        )
        .unwrap();
        let frame = BookFrame::from(wire);
        assert_eq!(frame.action, BookAction::Update);
        assert_eq!(frame.bids[0].size, Decimal::ZERO);
        assert_eq!(frame.prev_sequence_no, Some(10));
        assert_eq!(frame.checksum.as_deref(), Some("2815010497"));
    }

    #[test]
    fn test_l2_update_snapshot_action() {
        let wire: L2Update =
            serde_json::from_str(r#"{"symbol":"ETHUSD","action":"snapshot","bids":[],"asks":[]}"#)
                .unwrap();
        assert_eq!(BookFrame::from(wire).action, BookAction::Snapshot);
    }
}
