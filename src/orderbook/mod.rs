//! Core order book implementation module
//!
//! `PriceLevel` holds one price's FIFO queue, `OrderBook` indexes levels by
//! side and price and orders by id, and `Matcher` runs price-time priority
//! matching on top of a single book.

pub mod book;
pub mod error;
pub mod matching;
pub mod price_level;
pub mod types;

// Re-export main types for convenience
pub use book::{OrderBook, OrderBookStats};
pub use error::{OrderBookError, OrderBookResult};
pub use matching::{Matcher, Placement};
pub use price_level::{Fill, PriceLevel};
pub use types::{Order, OrderId, Price, Quantity, Side, Tick, TopOfBook, Transaction};
