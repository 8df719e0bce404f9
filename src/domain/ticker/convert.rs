//! Conversions from wire frames to `Ticker`.

use super::wire::TickerFrame;
use super::Ticker;
use rust_decimal::Decimal;

impl From<TickerFrame> for Ticker {
    fn from(frame: TickerFrame) -> Self {
        let quotes = frame.quotes.unwrap_or_default();
        let last_price = frame.close.or(frame.mark_price).unwrap_or_default();

        let change_24h = frame.open.map(|open| last_price - open);
        let change_24h_pct = frame.ltp_change_24h.or_else(|| {
            let open = frame.open?;
            if open.is_zero() {
                None
            } else {
                Some((last_price - open) / open * Decimal::from(100))
            }
        });

        Self {
            symbol: frame.symbol,
            product_id: frame.product_id,
            last_price,
            open: frame.open,
            high: frame.high,
            low: frame.low,
            volume: frame.volume,
            turnover: frame.turnover,
            change_24h,
            change_24h_pct,
            mark_price: frame.mark_price,
            spot_price: frame.spot_price,
            best_bid: quotes.best_bid,
            best_ask: quotes.best_ask,
            bid_size: quotes.bid_size,
            ask_size: quotes.ask_size,
            open_interest: frame.oi,
            funding_rate: frame.funding_rate,
            timestamp: frame.timestamp,
        }
    }
}
