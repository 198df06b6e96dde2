use chrono::{DateTime, Utc};
use slab::Slab;
use std::collections::HashMap;

use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::orderbook::types::{Order, OrderId, Price, Quantity, Side};

/// Slab entry linking one order into its level's FIFO queue.
#[derive(Debug)]
struct OrderNode {
    order: Order,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Outcome of filling the order at the head of a level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    pub order_id: OrderId,
    pub quantity: Quantity,
    pub remaining: Quantity,
}

/// Represents a price level in the order book
/// All orders at this price level maintain time priority (FIFO)
///
/// Orders live in a slab and are chained head-to-tail by slab key, so both
/// appending and unlinking an arbitrary order are O(1). `nodes` maps order
/// ids to their slab key.
#[derive(Debug)]
pub struct PriceLevel {
    side: Side,
    price: Price,
    total_quantity: Quantity,
    orders: Slab<OrderNode>,
    nodes: HashMap<OrderId, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl PriceLevel {
    pub fn new(side: Side, price: Price) -> Self {
        Self {
            side,
            price,
            total_quantity: 0,
            orders: Slab::new(),
            nodes: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn price(&self) -> Price {
        self.price
    }

    /// Sum of the remaining quantity of every order at this level
    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    pub fn order_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.nodes.contains_key(order_id)
    }

    pub fn get(&self, order_id: &str) -> Option<&Order> {
        self.nodes.get(order_id).map(|&idx| &self.orders[idx].order)
    }

    /// Whether `add` would accept `order`. Nothing is modified.
    pub fn check_add(&self, order: &Order) -> OrderBookResult<()> {
        if order.price != self.price {
            return Err(OrderBookError::PriceMismatch {
                level: self.price,
                order: order.price,
            });
        }
        if self.nodes.contains_key(&order.id) {
            return Err(OrderBookError::DuplicateOrder(order.id.clone()));
        }
        self.total_quantity
            .checked_add(order.remaining_quantity)
            .map(|_| ())
            .ok_or(OrderBookError::QuantityOverflow {
                price: self.price,
                quantity: order.remaining_quantity,
            })
    }

    /// Append an order behind every order already resting here.
    pub fn add(&mut self, order: Order) -> OrderBookResult<()> {
        self.check_add(&order)?;
        debug_assert_eq!(order.side, self.side);

        let quantity = order.remaining_quantity;
        let order_id = order.id.clone();
        let idx = self.orders.insert(OrderNode {
            order,
            prev: self.tail,
            next: None,
        });

        match self.tail {
            Some(tail) => self.orders[tail].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);

        self.nodes.insert(order_id, idx);
        self.total_quantity += quantity;
        Ok(())
    }

    /// Unlink an order and hand it back to the caller.
    pub fn remove(&mut self, order_id: &str) -> OrderBookResult<Order> {
        let idx = self
            .nodes
            .remove(order_id)
            .ok_or_else(|| OrderBookError::OrderNotFound(order_id.to_string()))?;

        let node = self.orders.remove(idx);
        match node.prev {
            Some(prev) => self.orders[prev].next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.orders[next].prev = node.prev,
            None => self.tail = node.prev,
        }

        self.total_quantity -= node.order.remaining_quantity;
        Ok(node.order)
    }

    /// The oldest order still resting here.
    pub fn first_order(&self) -> Option<&Order> {
        self.head.map(|idx| &self.orders[idx].order)
    }

    /// Fill the head order by up to `quantity`. A fully filled head stays
    /// linked with zero remaining quantity until the caller removes it.
    pub fn fill_first(&mut self, quantity: Quantity, at: DateTime<Utc>) -> Option<Fill> {
        let idx = self.head?;
        let order = &mut self.orders[idx].order;
        let filled = order.fill(quantity, at);
        self.total_quantity -= filled;

        Some(Fill {
            order_id: order.id.clone(),
            quantity: filled,
            remaining: order.remaining_quantity,
        })
    }

    /// Orders in arrival order.
    pub fn iter(&self) -> LevelIter<'_> {
        LevelIter {
            orders: &self.orders,
            cursor: self.head,
        }
    }
}

pub struct LevelIter<'a> {
    orders: &'a Slab<OrderNode>,
    cursor: Option<usize>,
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = &'a Order;

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let node = &self.orders[idx];
        self.cursor = node.next;
        Some(&node.order)
    }
}
