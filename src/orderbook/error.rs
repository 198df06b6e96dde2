use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orderbook::types::{OrderId, Price, Quantity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBookError {
    /// No resting order carries this identifier
    OrderNotFound(OrderId),

    /// An order was routed to a level with a different price
    PriceMismatch { level: Price, order: Price },

    /// An order with this identifier is already resting
    DuplicateOrder(OrderId),

    /// Resting the order would overflow the open quantity at its price
    QuantityOverflow { price: Price, quantity: Quantity },
}

impl fmt::Display for OrderBookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderBookError::OrderNotFound(id) => write!(f, "Order not found: {}", id),
            OrderBookError::PriceMismatch { level, order } => write!(
                f,
                "Order price {} does not match price level {}",
                order, level
            ),
            OrderBookError::DuplicateOrder(id) => write!(f, "Order already resting: {}", id),
            OrderBookError::QuantityOverflow { price, quantity } => write!(
                f,
                "Quantity {} overflows open quantity at price level {}",
                quantity, price
            ),
        }
    }
}

impl std::error::Error for OrderBookError {}

/// Result type for order book operations
pub type OrderBookResult<T> = Result<T, OrderBookError>;
