pub mod worker;

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::events::{CreateOrder, IntentError, IntentKind, MatchingEvent, OrderIntent};
use crate::metrics::EngineMetrics;
use crate::orderbook::{Matcher, OrderBook, OrderBookError};

pub use worker::{spawn_worker, EngineRouter, RouteError, WorkerHandle};

/// Binds one symbol's `Matcher` to the boundary records.
///
/// Each call to `process` turns one intent into one `MatchingEvent` carrying
/// the affected order, any transactions and the best `tick_num` levels per
/// side after the operation.
pub struct MatchingEngine {
    symbol: String,
    tick_num: usize,
    matcher: Matcher,
    metrics: Arc<EngineMetrics>,
}

impl MatchingEngine {
    pub fn new(symbol: impl Into<String>, tick_num: usize) -> Self {
        let symbol = symbol.into();
        let matcher = Matcher::new(OrderBook::new(symbol.clone()));
        Self::with_matcher(matcher, tick_num)
    }

    /// Wrap an existing matcher, e.g. one built with a deterministic clock.
    pub fn with_matcher(matcher: Matcher, tick_num: usize) -> Self {
        let symbol = matcher.book().symbol().to_string();
        info!("Matching engine for {} ready (tick_num={})", symbol, tick_num);

        Self {
            metrics: Arc::new(EngineMetrics::new(symbol.clone())),
            symbol,
            tick_num,
            matcher,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn tick_num(&self) -> usize {
        self.tick_num
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn book(&self) -> &OrderBook {
        self.matcher.book()
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn process(&mut self, intent: OrderIntent) -> Result<MatchingEvent, EngineError> {
        let kind = intent.kind();
        let result = match intent {
            OrderIntent::Create(create) => self.create(create),
            OrderIntent::Cancel(cancel) => self.cancel(&cancel.id),
        };

        match &result {
            Ok(event) => {
                self.metrics.record_intent(kind);
                self.metrics.record_trades(
                    event.transactions.len() as u64,
                    event.transactions.iter().map(|t| t.quantity).sum(),
                );
                self.metrics.record_book(&self.matcher.book().stats());
            }
            Err(_) => self.metrics.record_rejected(kind),
        }
        result
    }

    fn create(&mut self, create: CreateOrder) -> Result<MatchingEvent, EngineError> {
        if self.matcher.book().contains(&create.id) {
            return Err(IntentError::DuplicateOrder(create.id).into());
        }
        let order = create.into_order()?;

        let matcher = &mut self.matcher;
        let placement = self.metrics.time_place(|| matcher.place_order(order))?;
        debug!(
            "{}: order {} produced {} transactions",
            self.symbol,
            placement.order.id,
            placement.transactions.len()
        );

        Ok(MatchingEvent::new(
            IntentKind::Create,
            placement.order,
            placement.transactions,
            self.matcher.top_ticks(self.tick_num),
        ))
    }

    fn cancel(&mut self, order_id: &str) -> Result<MatchingEvent, EngineError> {
        let matcher = &mut self.matcher;
        let order = self.metrics.time_cancel(|| matcher.cancel_order(order_id))?;

        Ok(MatchingEvent::new(
            IntentKind::Cancel,
            order,
            Vec::new(),
            self.matcher.top_ticks(self.tick_num),
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    Book(OrderBookError),
    Intent(IntentError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Book(e) => write!(f, "{}", e),
            EngineError::Intent(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Book(e) => Some(e),
            EngineError::Intent(e) => Some(e),
        }
    }
}

impl From<OrderBookError> for EngineError {
    fn from(e: OrderBookError) -> Self {
        EngineError::Book(e)
    }
}

impl From<IntentError> for EngineError {
    fn from(e: IntentError) -> Self {
        EngineError::Intent(e)
    }
}
