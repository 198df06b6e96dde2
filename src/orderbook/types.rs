use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type OrderId = String;
pub type Price = Decimal;
pub type Quantity = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side an incoming order of this side matches against.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Whether a resting level at `level_price` can trade with an incoming
    /// order of this side limited at `limit`.
    pub fn crosses(self, limit: Price, level_price: Price) -> bool {
        match self {
            Side::Buy => level_price <= limit,
            Side::Sell => level_price >= limit,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A limit order together with its fill state.
///
/// `quantity` is the original size and never changes. The filled amount is
/// not stored: it is whatever is left of `quantity` after `remaining_quantity`
/// and `canceled_quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub canceled_quantity: Quantity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        id: impl Into<OrderId>,
        symbol: impl Into<String>,
        side: Side,
        price: Price,
        quantity: Quantity,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            side,
            price,
            quantity,
            remaining_quantity: quantity,
            canceled_quantity: 0,
            created_at,
            updated_at: created_at,
        }
    }

    /// Fill up to `quantity` units and return how many were actually taken.
    pub fn fill(&mut self, quantity: Quantity, at: DateTime<Utc>) -> Quantity {
        let filled = quantity.min(self.remaining_quantity);
        self.remaining_quantity -= filled;
        self.updated_at = at;
        filled
    }

    /// Move everything still open into `canceled_quantity`.
    pub fn cancel(&mut self, at: DateTime<Utc>) -> Quantity {
        let canceled = self.remaining_quantity;
        self.canceled_quantity += canceled;
        self.remaining_quantity = 0;
        self.updated_at = at;
        canceled
    }

    pub fn filled_quantity(&self) -> Quantity {
        self.quantity - self.remaining_quantity - self.canceled_quantity
    }

    pub fn is_complete(&self) -> bool {
        self.remaining_quantity == 0
    }
}

/// One match between an incoming (taker) order and a resting (maker) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub symbol: String,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub price: Price,
    pub quantity: Quantity,
    pub created_at: DateTime<Utc>,
}

/// Aggregated open quantity at one price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub price: Price,
    pub quantity: Quantity,
}

/// Best price levels per side, best price first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopOfBook {
    pub bids: Vec<Tick>,
    pub asks: Vec<Tick>,
}
