//! Records exchanged with the surrounding transport.
//!
//! Intents arrive as JSON `{"type": "Create" | "Cancel", "data": {...}}` and
//! every processed intent yields one `MatchingEvent`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orderbook::types::{Order, OrderId, Price, Quantity, Side, Tick, TopOfBook, Transaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntentKind {
    Create,
    Cancel,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::Create => "create",
            IntentKind::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
}

impl CreateOrder {
    /// Reject prices and quantities a limit order cannot carry.
    pub fn validate(&self) -> Result<(), IntentError> {
        if self.price <= Price::ZERO {
            return Err(IntentError::InvalidPrice(self.price));
        }
        if self.quantity == 0 {
            return Err(IntentError::InvalidQuantity);
        }
        Ok(())
    }

    pub fn into_order(self) -> Result<Order, IntentError> {
        self.validate()?;
        Ok(Order::new(
            self.id,
            self.symbol,
            self.side,
            self.price,
            self.quantity,
            self.created_at,
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub id: OrderId,
    /// Only used to route the cancel to the right book.
    #[serde(default)]
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderIntent {
    Create(CreateOrder),
    Cancel(CancelOrder),
}

impl OrderIntent {
    pub fn kind(&self) -> IntentKind {
        match self {
            OrderIntent::Create(_) => IntentKind::Create,
            OrderIntent::Cancel(_) => IntentKind::Cancel,
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            OrderIntent::Create(create) => &create.id,
            OrderIntent::Cancel(cancel) => &cancel.id,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            OrderIntent::Create(create) => &create.symbol,
            OrderIntent::Cancel(cancel) => &cancel.symbol,
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, IntentError> {
        serde_json::from_slice(bytes).map_err(|e| IntentError::Decode(e.to_string()))
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Outcome of one processed intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingEvent {
    #[serde(rename = "type")]
    pub kind: IntentKind,
    pub order: Order,
    pub transactions: Vec<Transaction>,
    pub bid_ticks: Vec<Tick>,
    pub ask_ticks: Vec<Tick>,
}

impl MatchingEvent {
    pub fn new(kind: IntentKind, order: Order, transactions: Vec<Transaction>, top: TopOfBook) -> Self {
        Self {
            kind,
            order,
            transactions,
            bid_ticks: top.bids,
            ask_ticks: top.asks,
        }
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentError {
    /// Payload is not a well-formed intent
    Decode(String),

    /// Price is zero or negative
    InvalidPrice(Price),

    /// Quantity is zero
    InvalidQuantity,

    /// An order with this id is already resting
    DuplicateOrder(OrderId),
}

impl fmt::Display for IntentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntentError::Decode(msg) => write!(f, "Malformed intent: {}", msg),
            IntentError::InvalidPrice(price) => write!(f, "Invalid price: {}", price),
            IntentError::InvalidQuantity => write!(f, "Invalid quantity"),
            IntentError::DuplicateOrder(id) => write!(f, "Order already exists: {}", id),
        }
    }
}

impl std::error::Error for IntentError {}
