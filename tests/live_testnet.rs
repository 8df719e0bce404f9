//! Live tests against the Delta Exchange testnet.
//!
//! All tests are `#[ignore]` because they require network access. Private
//! channel tests additionally need `DELTA_API_KEY` / `DELTA_API_SECRET`
//! (read from the environment or a `.env` file).
//!
//! Run with:
//! ```bash
//! cargo test --test live_testnet -- --ignored
//! ```

#![cfg(feature = "ws-native")]

use std::time::Duration;

use tokio::time::timeout;

use delta_stream::prelude::*;

const TEST_TIMEOUT: Duration = Duration::from_secs(20);
const TEST_SYMBOL: &str = "BTCUSD";

fn testnet_config() -> StreamConfig {
    let _ = dotenvy::dotenv();
    let mut config = StreamConfig::from_env().expect("valid DELTA_* environment");
    if std::env::var("DELTA_ENV").is_err() && config.url.is_none() {
        config.environment = Environment::Testnet;
    }
    config
}

async fn next_matching(
    client: &DeltaStreamClient,
    topics: &[Topic],
    predicate: impl Fn(&WsEvent) -> bool,
) -> WsEvent {
    let mut events = client.events(topics);
    timeout(TEST_TIMEOUT, async {
        while let Some(ev) = events.recv().await {
            if predicate(&ev) {
                return ev;
            }
        }
        panic!("event bus closed without a matching event");
    })
    .await
    .expect("timed out waiting for matching event")
}

#[tokio::test]
#[ignore]
async fn ticker_and_orderbook_stream() {
    let mut config = testnet_config();
    config.api_key = None;
    config.api_secret = None;
    let client = DeltaStreamClient::new(config).unwrap();

    client.connect().await.expect("connect should succeed");
    client.subscribe_tickers([TEST_SYMBOL]).await.unwrap();
    client.subscribe_orderbook_updates([TEST_SYMBOL]).await.unwrap();

    next_matching(&client, &[Topic::Ticker], |ev| {
        matches!(ev, WsEvent::Ticker(t) if t.symbol == TEST_SYMBOL)
    })
    .await;
    next_matching(&client, &[Topic::OrderBook], |ev| {
        matches!(ev, WsEvent::OrderBook { symbol, .. } if symbol == TEST_SYMBOL)
    })
    .await;

    let book = client.get_orderbook(TEST_SYMBOL).await.expect("book cached");
    assert!(book.has_snapshot());
    if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
        assert!(bid.price < ask.price, "crossed book: {bid:?} / {ask:?}");
    }

    client.unsubscribe_orderbook_updates([TEST_SYMBOL]).await.unwrap();
    assert!(client.get_orderbook(TEST_SYMBOL).await.is_none());

    client.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn authenticated_session_receives_margins() {
    let config = testnet_config();
    if !config.has_credentials() {
        eprintln!("DELTA_API_KEY / DELTA_API_SECRET not set, skipping");
        return;
    }
    let client = DeltaStreamClient::new(config).unwrap();

    client.connect().await.expect("authenticated connect");
    assert_eq!(client.state(), SessionState::Authenticated);

    client.subscribe_balances().await.unwrap();
    next_matching(&client, &[Topic::Balance], |ev| matches!(ev, WsEvent::Balance(_))).await;
    assert!(!client.all_balances().await.is_empty());

    client.disconnect().await.unwrap();
}
