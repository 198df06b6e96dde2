//! Price-Time Priority Order Matching Engine
//!
//! A deterministic limit order book for one symbol per engine, with a thin
//! asynchronous shell that runs one engine per symbol and speaks JSON records.
//!
//! # Features
//!
//! - **Price-Time Priority**: best price first, strict FIFO within a price level
//! - **Exact Accounting**: every unit is either resting, traded or canceled
//! - **O(1) Cancellation**: orders are indexed by id and unlinked in place
//! - **Deterministic**: clock and transaction ids are injected
//! - **Monitoring**: `metrics` facade with an optional Prometheus exporter
//!
//! # Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use order_matching_engine::{Matcher, Order, OrderBook, Price, Side};
//!
//! let mut matcher = Matcher::new(OrderBook::new("BTCUSD"));
//!
//! let ask = Order::new("S1", "BTCUSD", Side::Sell, Price::from(100), 10, Utc::now());
//! matcher.place_order(ask)?;
//!
//! let bid = Order::new("B1", "BTCUSD", Side::Buy, Price::from(100), 4, Utc::now());
//! let placement = matcher.place_order(bid)?;
//! assert_eq!(placement.transactions.len(), 1);
//!
//! let top = matcher.top_ticks(5);
//! assert_eq!(top.asks[0].quantity, 6);
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! 1. **Price Levels**: each `PriceLevel` keeps its orders in a slab-backed
//!    doubly linked list with an id index
//! 2. **Order Book**: levels live in a slab arena, ordered per side by a
//!    `BTreeMap<Price, usize>` and indexed by `(side, price)` and order id
//! 3. **Matcher**: walks the best opposite level while it crosses, executing
//!    at the resting order's price
//! 4. **Engine**: one `MatchingEngine` per symbol, owned by a tokio task and
//!    fed through a bounded channel

pub mod config;
pub mod engine;
pub mod events;
pub mod metrics;
pub mod orderbook;
pub mod utils;

// Re-export commonly used types
pub use engine::{EngineError, EngineRouter, MatchingEngine, RouteError};
pub use events::{IntentError, IntentKind, MatchingEvent, OrderIntent};
pub use orderbook::{
    error::{OrderBookError, OrderBookResult},
    types::{Order, OrderId, Price, Quantity, Side, Tick, TopOfBook, Transaction},
    Matcher, OrderBook, Placement,
};

pub use crate::metrics::EngineMetrics;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::utils::{SequentialIdGenerator, SteppingClock};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn matcher() -> Matcher {
        let clock = SteppingClock::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Duration::from_millis(1),
        );
        Matcher::with_dependencies(
            OrderBook::new("TEST"),
            Box::new(clock),
            Box::new(SequentialIdGenerator::new("T")),
        )
    }

    fn limit(id: &str, side: Side, price: Price, quantity: Quantity) -> Order {
        Order::new(
            id,
            "TEST",
            side,
            price,
            quantity,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        )
    }

    #[test]
    fn test_partial_fill_of_resting_order() {
        let mut matcher = matcher();
        matcher.place_order(limit("S1", Side::Sell, dec!(100), 10)).unwrap();

        let placement = matcher.place_order(limit("B1", Side::Buy, dec!(100), 5)).unwrap();
        assert_eq!(placement.transactions.len(), 1);

        let trade = &placement.transactions[0];
        assert_eq!(trade.price, dec!(100));
        assert_eq!(trade.quantity, 5);
        assert_eq!(trade.buy_order_id, "B1");
        assert_eq!(trade.sell_order_id, "S1");

        assert_eq!(matcher.book().get_order("S1").unwrap().remaining_quantity, 5);
        assert_eq!(placement.order.remaining_quantity, 0);
        assert!(!placement.rested());
        assert!(!matcher.book().contains("B1"));
    }

    #[test]
    fn test_time_priority_within_level() {
        let mut matcher = matcher();
        matcher.place_order(limit("S1", Side::Sell, dec!(99), 5)).unwrap();
        matcher.place_order(limit("S2", Side::Sell, dec!(99), 5)).unwrap();

        let placement = matcher.place_order(limit("B1", Side::Buy, dec!(100), 7)).unwrap();
        let fills: Vec<(&str, &str, Price, Quantity)> = placement
            .transactions
            .iter()
            .map(|t| {
                (
                    t.buy_order_id.as_str(),
                    t.sell_order_id.as_str(),
                    t.price,
                    t.quantity,
                )
            })
            .collect();
        assert_eq!(
            fills,
            vec![("B1", "S1", dec!(99), 5), ("B1", "S2", dec!(99), 2)]
        );

        assert!(!matcher.book().contains("S1"));
        assert_eq!(matcher.book().get_order("S2").unwrap().remaining_quantity, 3);
        assert_eq!(placement.order.remaining_quantity, 0);
    }

    #[test]
    fn test_no_cross_rests_order() {
        let mut matcher = matcher();
        let placement = matcher.place_order(limit("B1", Side::Buy, dec!(100), 10)).unwrap();

        assert!(placement.transactions.is_empty());
        assert!(placement.rested());
        assert!(matcher.book().contains("B1"));

        let top = matcher.top_ticks(1);
        assert_eq!(
            top.bids,
            vec![Tick {
                price: dec!(100),
                quantity: 10
            }]
        );
        assert!(top.asks.is_empty());
    }

    #[test]
    fn test_cancel_resting_order() {
        let mut matcher = matcher();
        matcher.place_order(limit("B1", Side::Buy, dec!(100), 10)).unwrap();

        let canceled = matcher.cancel_order("B1").unwrap();
        assert_eq!(canceled.canceled_quantity, 10);
        assert_eq!(matcher.book().level_count(Side::Buy), 0);
        assert!(matcher.top_ticks(5).bids.is_empty());
    }

    #[test]
    fn test_cancel_unknown_order() {
        let mut matcher = matcher();
        matcher.place_order(limit("B1", Side::Buy, dec!(100), 10)).unwrap();
        let before = matcher.top_ticks(5);

        let err = matcher.cancel_order("X").unwrap_err();
        assert_eq!(err, OrderBookError::OrderNotFound("X".to_string()));
        assert_eq!(matcher.top_ticks(5), before);
        assert_eq!(matcher.book().len(), 1);
    }

    #[test]
    fn test_sweep_across_levels() {
        let mut matcher = matcher();
        for i in 0..10u32 {
            let price = dec!(100) + Price::from(i);
            matcher
                .place_order(limit(&format!("S{}", i), Side::Sell, price, 10))
                .unwrap();
        }

        let placement = matcher.place_order(limit("B1", Side::Buy, dec!(104), 35)).unwrap();

        let walked: Vec<(Price, Quantity)> = placement
            .transactions
            .iter()
            .map(|t| (t.price, t.quantity))
            .collect();
        assert_eq!(
            walked,
            vec![
                (dec!(100), 10),
                (dec!(101), 10),
                (dec!(102), 10),
                (dec!(103), 5)
            ]
        );
        assert_eq!(placement.order.remaining_quantity, 0);

        for id in ["S0", "S1", "S2"] {
            assert!(!matcher.book().contains(id));
        }
        assert_eq!(matcher.book().get_order("S3").unwrap().remaining_quantity, 5);
        for i in 4..10 {
            let id = format!("S{}", i);
            assert_eq!(matcher.book().get_order(&id).unwrap().remaining_quantity, 10);
        }

        let asks: Vec<(Price, Quantity)> = matcher
            .top_ticks(5)
            .asks
            .iter()
            .map(|t| (t.price, t.quantity))
            .collect();
        assert_eq!(
            asks,
            vec![
                (dec!(103), 5),
                (dec!(104), 10),
                (dec!(105), 10),
                (dec!(106), 10),
                (dec!(107), 10)
            ]
        );
    }

    #[test]
    fn test_limit_stops_sweep_and_rests_remainder() {
        let mut matcher = matcher();
        matcher.place_order(limit("S1", Side::Sell, dec!(100), 10)).unwrap();
        matcher.place_order(limit("S2", Side::Sell, dec!(102), 10)).unwrap();

        let placement = matcher.place_order(limit("B1", Side::Buy, dec!(101), 15)).unwrap();
        assert_eq!(placement.transactions.len(), 1);
        assert_eq!(placement.order.remaining_quantity, 5);

        let top = matcher.top_ticks(5);
        assert_eq!(top.bids[0].price, dec!(101));
        assert_eq!(top.bids[0].quantity, 5);
        assert_eq!(top.asks[0].price, dec!(102));
        assert_eq!(matcher.book().spread(), Some(dec!(1)));
    }

    #[test]
    fn test_top_ticks_is_idempotent() {
        let mut matcher = matcher();
        matcher.place_order(limit("B1", Side::Buy, dec!(99), 3)).unwrap();
        matcher.place_order(limit("S1", Side::Sell, dec!(101), 4)).unwrap();

        assert_eq!(matcher.top_ticks(3), matcher.top_ticks(3));
    }

    #[test]
    fn test_engine_json_round_trip() {
        let mut engine = MatchingEngine::with_matcher(matcher(), 5);

        let sell = OrderIntent::decode(
            br#"{"type":"Create","data":{"id":"S1","symbol":"TEST","side":"SELL",
                "price":"100.50","quantity":10,"created_at":"2024-01-02T03:04:05Z"}}"#,
        )
        .unwrap();
        engine.process(sell).unwrap();

        let buy = OrderIntent::decode(
            br#"{"type":"Create","data":{"id":"B1","symbol":"TEST","side":"BUY",
                "price":"101","quantity":4,"created_at":"2024-01-02T03:04:06Z"}}"#,
        )
        .unwrap();
        let event = engine.process(buy).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&event.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "Create");
        assert_eq!(value["transactions"][0]["price"], "100.50");
        assert_eq!(value["transactions"][0]["quantity"], 4);
        assert_eq!(value["ask_ticks"][0]["quantity"], 6);
        assert_eq!(value["order"]["remaining_quantity"], 0);
    }
}
