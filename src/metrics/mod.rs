use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use rust_decimal::prelude::ToPrimitive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::info;

use crate::events::IntentKind;
use crate::orderbook::book::OrderBookStats;
use crate::orderbook::types::Price;
use crate::utils::LatencyTimer;

/// Metrics for one symbol's matching engine.
///
/// Every update goes to the global `metrics` recorder (labelled with the
/// symbol) and to local atomics that back `snapshot` and the periodic
/// reporter.
#[derive(Debug)]
pub struct EngineMetrics {
    symbol: String,

    place_latency: LatencyTracker,
    cancel_latency: LatencyTracker,

    orders_placed: AtomicU64,
    orders_cancelled: AtomicU64,
    intents_rejected: AtomicU64,
    trades_executed: AtomicU64,
    volume: AtomicU64,

    resting_orders: AtomicU64,
    bid_levels: AtomicU64,
    ask_levels: AtomicU64,
}

impl EngineMetrics {
    pub fn new(symbol: impl Into<String>) -> Self {
        describe_counter!("matching_intents_total", "Intents processed by kind");
        describe_counter!("matching_rejected_total", "Intents rejected by kind");
        describe_counter!("matching_trades_total", "Transactions generated");
        describe_counter!("matching_volume_total", "Quantity matched");
        describe_histogram!(
            "matching_operation_duration_seconds",
            "Duration of place and cancel operations"
        );
        describe_gauge!("matching_levels", "Price levels per side");
        describe_gauge!("matching_resting_orders", "Orders resting in the book");
        describe_gauge!("matching_best_bid", "Best bid price");
        describe_gauge!("matching_best_ask", "Best ask price");

        let symbol = symbol.into();
        Self {
            place_latency: LatencyTracker::new(&symbol, "place"),
            cancel_latency: LatencyTracker::new(&symbol, "cancel"),
            symbol,
            orders_placed: AtomicU64::new(0),
            orders_cancelled: AtomicU64::new(0),
            intents_rejected: AtomicU64::new(0),
            trades_executed: AtomicU64::new(0),
            volume: AtomicU64::new(0),
            resting_orders: AtomicU64::new(0),
            bid_levels: AtomicU64::new(0),
            ask_levels: AtomicU64::new(0),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    // Latency measurement methods
    pub fn time_place<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.place_latency.time(f)
    }

    pub fn time_cancel<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.cancel_latency.time(f)
    }

    // Counter methods
    pub fn record_intent(&self, kind: IntentKind) {
        match kind {
            IntentKind::Create => self.orders_placed.fetch_add(1, Ordering::Relaxed),
            IntentKind::Cancel => self.orders_cancelled.fetch_add(1, Ordering::Relaxed),
        };
        counter!("matching_intents_total", "symbol" => self.symbol.clone(), "kind" => kind.as_str())
            .increment(1);
    }

    pub fn record_rejected(&self, kind: IntentKind) {
        self.intents_rejected.fetch_add(1, Ordering::Relaxed);
        counter!("matching_rejected_total", "symbol" => self.symbol.clone(), "kind" => kind.as_str())
            .increment(1);
    }

    pub fn record_trades(&self, count: u64, quantity: u64) {
        if count == 0 {
            return;
        }
        self.trades_executed.fetch_add(count, Ordering::Relaxed);
        self.volume.fetch_add(quantity, Ordering::Relaxed);

        counter!("matching_trades_total", "symbol" => self.symbol.clone()).increment(count);
        counter!("matching_volume_total", "symbol" => self.symbol.clone()).increment(quantity);
    }

    // Gauge methods
    pub fn record_book(&self, stats: &OrderBookStats) {
        self.resting_orders
            .store(stats.total_orders as u64, Ordering::Relaxed);
        self.bid_levels
            .store(stats.bid_levels as u64, Ordering::Relaxed);
        self.ask_levels
            .store(stats.ask_levels as u64, Ordering::Relaxed);

        gauge!("matching_resting_orders", "symbol" => self.symbol.clone())
            .set(stats.total_orders as f64);
        gauge!("matching_levels", "symbol" => self.symbol.clone(), "side" => "bid")
            .set(stats.bid_levels as f64);
        gauge!("matching_levels", "symbol" => self.symbol.clone(), "side" => "ask")
            .set(stats.ask_levels as f64);
        gauge!("matching_best_bid", "symbol" => self.symbol.clone())
            .set(price_gauge(stats.best_bid));
        gauge!("matching_best_ask", "symbol" => self.symbol.clone())
            .set(price_gauge(stats.best_ask));
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            orders_placed: self.orders_placed.load(Ordering::Relaxed),
            orders_cancelled: self.orders_cancelled.load(Ordering::Relaxed),
            intents_rejected: self.intents_rejected.load(Ordering::Relaxed),
            trades_executed: self.trades_executed.load(Ordering::Relaxed),
            volume: self.volume.load(Ordering::Relaxed),
            resting_orders: self.resting_orders.load(Ordering::Relaxed),
            bid_levels: self.bid_levels.load(Ordering::Relaxed),
            ask_levels: self.ask_levels.load(Ordering::Relaxed),
            place: self.place_latency.get_stats(),
            cancel: self.cancel_latency.get_stats(),
        }
    }
}

/// Gauge value for a best price. An empty side reads as NaN so the last
/// price does not linger after the side clears.
fn price_gauge(price: Option<Price>) -> f64 {
    price.and_then(|p| p.to_f64()).unwrap_or(f64::NAN)
}

/// Latency tracker for individual operations
#[derive(Debug)]
struct LatencyTracker {
    symbol: String,
    operation: &'static str,
    samples: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl LatencyTracker {
    fn new(symbol: &str, operation: &'static str) -> Self {
        Self {
            symbol: symbol.to_string(),
            operation,
            samples: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            max_nanos: AtomicU64::new(0),
        }
    }

    fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let timer = LatencyTimer::start();
        let result = f();
        self.record_latency(timer.stop());
        result
    }

    fn record_latency(&self, duration: Duration) {
        let nanos = duration.as_nanos() as u64;

        self.samples.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);

        histogram!(
            "matching_operation_duration_seconds",
            "symbol" => self.symbol.clone(),
            "operation" => self.operation
        )
        .record(duration.as_secs_f64());
    }

    fn get_stats(&self) -> OperationLatencyStats {
        let samples = self.samples.load(Ordering::Relaxed);
        let total = self.total_nanos.load(Ordering::Relaxed);

        OperationLatencyStats {
            samples,
            avg_nanos: if samples > 0 { total / samples } else { 0 },
            max_nanos: self.max_nanos.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationLatencyStats {
    pub samples: u64,
    pub avg_nanos: u64,
    pub max_nanos: u64,
}

impl OperationLatencyStats {
    pub fn avg_micros(&self) -> f64 {
        self.avg_nanos as f64 / 1_000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub orders_placed: u64,
    pub orders_cancelled: u64,
    pub intents_rejected: u64,
    pub trades_executed: u64,
    pub volume: u64,
    pub resting_orders: u64,
    pub bid_levels: u64,
    pub ask_levels: u64,
    pub place: OperationLatencyStats,
    pub cancel: OperationLatencyStats,
}

/// Background metrics reporter
pub struct MetricsReporter {
    metrics: Vec<Arc<EngineMetrics>>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Vec<Arc<EngineMetrics>>, interval: Duration) -> Self {
        Self { metrics, interval }
    }

    pub async fn run(&self) {
        let mut interval = interval(self.interval);

        loop {
            interval.tick().await;

            for metrics in &self.metrics {
                let s = metrics.snapshot();
                info!(
                    "{} | Orders: +{} -{} rejected {} | Trades: {} ({} units) | Book: {} orders, {}/{} levels | Latency (μs): place={:.2} cancel={:.2}",
                    metrics.symbol(),
                    s.orders_placed,
                    s.orders_cancelled,
                    s.intents_rejected,
                    s.trades_executed,
                    s.volume,
                    s.resting_orders,
                    s.bid_levels,
                    s.ask_levels,
                    s.place.avg_micros(),
                    s.cancel.avg_micros()
                );
            }
        }
    }
}
