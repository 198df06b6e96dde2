//! One task per symbol. Each worker owns its engine outright and drains a
//! bounded channel, so intents for a symbol are applied strictly in the
//! order they were routed and books never share state.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::MatchingEngine;
use crate::events::{MatchingEvent, OrderIntent};
use crate::metrics::EngineMetrics;

pub struct WorkerHandle {
    symbol: String,
    intents: mpsc::Sender<OrderIntent>,
    metrics: Arc<EngineMetrics>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    pub async fn submit(&self, intent: OrderIntent) -> Result<(), RouteError> {
        self.intents
            .send(intent)
            .await
            .map_err(|_| RouteError::WorkerClosed(self.symbol.clone()))
    }

    /// Close the intent channel and wait for the backlog to drain.
    pub async fn shutdown(self) {
        drop(self.intents);
        if let Err(e) = self.task.await {
            error!("Worker for {} terminated abnormally: {}", self.symbol, e);
        }
    }
}

/// Run `engine` on its own task. Events for accepted intents are forwarded
/// to `events`; rejected intents are logged and dropped.
pub fn spawn_worker(
    mut engine: MatchingEngine,
    capacity: usize,
    events: mpsc::Sender<MatchingEvent>,
) -> WorkerHandle {
    let (tx, mut rx) = mpsc::channel::<OrderIntent>(capacity);
    let symbol = engine.symbol().to_string();
    let metrics = engine.metrics();

    let task = tokio::spawn(async move {
        info!("Worker for {} started", engine.symbol());

        while let Some(intent) = rx.recv().await {
            let kind = intent.kind();
            let order_id = intent.order_id().to_string();

            match engine.process(intent) {
                Ok(event) => {
                    if events.send(event).await.is_err() {
                        warn!("Event sink closed, stopping worker for {}", engine.symbol());
                        break;
                    }
                }
                Err(e) => {
                    warn!(
                        "Rejected {} intent for order {} on {}: {}",
                        kind.as_str(),
                        order_id,
                        engine.symbol(),
                        e
                    );
                }
            }
        }

        info!("Worker for {} stopped", engine.symbol());
    });

    WorkerHandle {
        symbol,
        intents: tx,
        metrics,
        task,
    }
}

/// Routes intents to the worker that owns their symbol.
pub struct EngineRouter {
    workers: DashMap<String, WorkerHandle>,
    tick_num: usize,
    capacity: usize,
    events: mpsc::Sender<MatchingEvent>,
}

impl EngineRouter {
    pub fn new(tick_num: usize, capacity: usize, events: mpsc::Sender<MatchingEvent>) -> Self {
        Self {
            workers: DashMap::new(),
            tick_num,
            capacity,
            events,
        }
    }

    /// Start a worker for `symbol`. Returns false if one already runs.
    pub fn add_symbol(&self, symbol: impl Into<String>) -> bool {
        // Shard stays locked until the new worker is inserted.
        match self.workers.entry(symbol.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                let engine = MatchingEngine::new(entry.key().clone(), self.tick_num);
                entry.insert(spawn_worker(engine, self.capacity, self.events.clone()));
                true
            }
        }
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.workers.iter().map(|w| w.key().clone()).collect();
        symbols.sort();
        symbols
    }

    pub fn metrics(&self) -> Vec<Arc<EngineMetrics>> {
        self.workers.iter().map(|w| w.metrics()).collect()
    }

    /// Forward an intent to its symbol's worker. A cancel without a symbol
    /// goes to the only worker when exactly one is running.
    pub async fn route(&self, intent: OrderIntent) -> Result<(), RouteError> {
        let sender = self.sender_for(intent.symbol())?;
        debug!("Routing {} intent for {}", intent.kind().as_str(), intent.order_id());

        let symbol = intent.symbol().to_string();
        sender
            .send(intent)
            .await
            .map_err(|_| RouteError::WorkerClosed(symbol))
    }

    fn sender_for(&self, symbol: &str) -> Result<mpsc::Sender<OrderIntent>, RouteError> {
        if let Some(worker) = self.workers.get(symbol) {
            return Ok(worker.intents.clone());
        }
        if symbol.is_empty() && self.workers.len() == 1 {
            if let Some(worker) = self.workers.iter().next() {
                return Ok(worker.intents.clone());
            }
        }
        Err(RouteError::UnknownSymbol(symbol.to_string()))
    }

    /// Stop every worker after it has drained its channel.
    pub async fn shutdown(self) {
        let symbols = self.symbols();
        for symbol in symbols {
            if let Some((_, handle)) = self.workers.remove(&symbol) {
                handle.shutdown().await;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    UnknownSymbol(String),
    WorkerClosed(String),
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::UnknownSymbol(symbol) => write!(f, "No worker for symbol: {:?}", symbol),
            RouteError::WorkerClosed(symbol) => write!(f, "Worker for {} is closed", symbol),
        }
    }
}

impl std::error::Error for RouteError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CancelOrder, CreateOrder, IntentKind};
    use crate::orderbook::{Price, Quantity, Side};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn create(id: &str, symbol: &str, side: Side, price: Price, quantity: Quantity) -> OrderIntent {
        OrderIntent::Create(CreateOrder {
            id: id.to_string(),
            symbol: symbol.to_string(),
            side,
            price,
            quantity,
            created_at: Utc::now(),
        })
    }

    fn cancel(id: &str, symbol: &str) -> OrderIntent {
        OrderIntent::Cancel(CancelOrder {
            id: id.to_string(),
            symbol: symbol.to_string(),
        })
    }

    #[tokio::test]
    async fn test_worker_processes_in_order() {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let worker = spawn_worker(MatchingEngine::new("BTCUSD", 5), 16, events_tx);

        worker
            .submit(create("S1", "BTCUSD", Side::Sell, dec!(100), 5))
            .await
            .unwrap();
        worker
            .submit(create("B1", "BTCUSD", Side::Buy, dec!(100), 3))
            .await
            .unwrap();
        worker.submit(cancel("S1", "BTCUSD")).await.unwrap();

        let first = events_rx.recv().await.unwrap();
        assert_eq!(first.order.id, "S1");
        assert!(first.transactions.is_empty());

        let second = events_rx.recv().await.unwrap();
        assert_eq!(second.transactions.len(), 1);
        assert_eq!(second.transactions[0].sell_order_id, "S1");
        assert_eq!(second.transactions[0].quantity, 3);

        let third = events_rx.recv().await.unwrap();
        assert_eq!(third.kind, IntentKind::Cancel);
        assert_eq!(third.order.canceled_quantity, 2);
        assert!(third.ask_ticks.is_empty());

        worker.shutdown().await;
    }

    #[tokio::test]
    async fn test_worker_drops_rejected_intents() {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let worker = spawn_worker(MatchingEngine::new("BTCUSD", 5), 16, events_tx);
        let metrics = worker.metrics();

        worker.submit(cancel("missing", "BTCUSD")).await.unwrap();
        worker
            .submit(create("B1", "BTCUSD", Side::Buy, dec!(100), 1))
            .await
            .unwrap();

        // The rejected cancel yields no event; the next one is the create.
        let event = events_rx.recv().await.unwrap();
        assert_eq!(event.order.id, "B1");

        worker.shutdown().await;
        assert!(events_rx.recv().await.is_none());
        assert_eq!(metrics.snapshot().intents_rejected, 1);
    }

    #[tokio::test]
    async fn test_router_keeps_books_separate() {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let router = EngineRouter::new(5, 16, events_tx);
        assert!(router.add_symbol("BTCUSD"));
        assert!(router.add_symbol("ETHUSD"));
        assert!(!router.add_symbol("BTCUSD"));
        assert_eq!(router.symbols(), vec!["BTCUSD", "ETHUSD"]);

        router
            .route(create("S1", "BTCUSD", Side::Sell, dec!(100), 5))
            .await
            .unwrap();
        let event = events_rx.recv().await.unwrap();
        assert_eq!(event.order.symbol, "BTCUSD");

        // Same price on another symbol must not cross.
        router
            .route(create("B1", "ETHUSD", Side::Buy, dec!(100), 5))
            .await
            .unwrap();
        let event = events_rx.recv().await.unwrap();
        assert_eq!(event.order.symbol, "ETHUSD");
        assert!(event.transactions.is_empty());
        assert!(event.ask_ticks.is_empty());

        let err = router
            .route(create("X1", "DOGEUSD", Side::Buy, dec!(1), 1))
            .await
            .unwrap_err();
        assert_eq!(err, RouteError::UnknownSymbol("DOGEUSD".to_string()));

        let err = router.route(cancel("S1", "")).await.unwrap_err();
        assert_eq!(err, RouteError::UnknownSymbol(String::new()));

        router.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_symbol_starts_one_worker() {
        let (events_tx, mut events_rx) = mpsc::channel(64);
        let router = Arc::new(EngineRouter::new(5, 16, events_tx));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let router = Arc::clone(&router);
            tasks.push(tokio::spawn(async move { router.add_symbol("BTCUSD") }));
        }
        let mut started = 0;
        for task in tasks {
            if task.await.unwrap() {
                started += 1;
            }
        }
        assert_eq!(started, 1);
        assert_eq!(router.symbols(), vec!["BTCUSD"]);

        router
            .route(create("B1", "BTCUSD", Side::Buy, dec!(100), 5))
            .await
            .unwrap();
        events_rx.recv().await.unwrap();

        let router = match Arc::try_unwrap(router) {
            Ok(router) => router,
            Err(_) => panic!("router still shared"),
        };
        router.shutdown().await;
    }

    #[tokio::test]
    async fn test_router_routes_bare_cancel_to_single_worker() {
        let (events_tx, mut events_rx) = mpsc::channel(16);
        let router = EngineRouter::new(5, 16, events_tx);
        router.add_symbol("BTCUSD");

        router
            .route(create("B1", "BTCUSD", Side::Buy, dec!(100), 5))
            .await
            .unwrap();
        router.route(cancel("B1", "")).await.unwrap();

        events_rx.recv().await.unwrap();
        let event = events_rx.recv().await.unwrap();
        assert_eq!(event.kind, IntentKind::Cancel);
        assert_eq!(event.order.canceled_quantity, 5);

        router.shutdown().await;
    }
}
