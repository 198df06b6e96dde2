use tracing::debug;

use crate::orderbook::book::OrderBook;
use crate::orderbook::error::OrderBookResult;
use crate::orderbook::types::{Order, Side, TopOfBook, Transaction};
use crate::utils::{Clock, IdGenerator, SystemClock, UuidGenerator};

/// Result of placing one order.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// The incoming order after matching. If `remaining_quantity` is non-zero
    /// the order now rests in the book.
    pub order: Order,
    /// Matches in execution order, oldest resting order first.
    pub transactions: Vec<Transaction>,
}

impl Placement {
    pub fn rested(&self) -> bool {
        self.order.remaining_quantity > 0
    }
}

/// Price-time priority matching over one order book.
///
/// The matcher keeps no order state of its own between calls; everything
/// lives in the bound `OrderBook`. Timestamps and transaction ids come from
/// the injected `Clock` and `IdGenerator`.
pub struct Matcher {
    book: OrderBook,
    clock: Box<dyn Clock>,
    ids: Box<dyn IdGenerator>,
}

impl Matcher {
    pub fn new(book: OrderBook) -> Self {
        Self::with_dependencies(book, Box::new(SystemClock), Box::new(UuidGenerator))
    }

    pub fn with_dependencies(
        book: OrderBook,
        clock: Box<dyn Clock>,
        ids: Box<dyn IdGenerator>,
    ) -> Self {
        Self { book, clock, ids }
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Match an incoming limit order against the opposite side, then rest
    /// whatever is left of it.
    ///
    /// Every match executes at the resting order's price. The walk stops as
    /// soon as the incoming order is filled or the best opposite level no
    /// longer crosses its limit.
    ///
    /// An order whose id is already resting, or whose quantity could not
    /// rest at its price, is rejected before anything is matched.
    pub fn place_order(&mut self, mut order: Order) -> OrderBookResult<Placement> {
        self.book.check_insert(&order)?;
        debug!(
            "Matching order {} {} {}@{}",
            order.id, order.side, order.remaining_quantity, order.price
        );

        let opposite = order.side.opposite();
        let mut transactions = Vec::new();

        while order.remaining_quantity > 0 {
            let level = match self.book.best_level_mut(opposite) {
                Some(level) => level,
                None => break,
            };

            let price = level.price();
            if !order.side.crosses(order.price, price) {
                break;
            }

            let now = self.clock.now();
            let fill = match level.fill_first(order.remaining_quantity, now) {
                Some(fill) => fill,
                None => break,
            };
            order.fill(fill.quantity, now);

            let (buy_order_id, sell_order_id) = match order.side {
                Side::Buy => (order.id.clone(), fill.order_id.clone()),
                Side::Sell => (fill.order_id.clone(), order.id.clone()),
            };
            transactions.push(Transaction {
                id: self.ids.next_id(),
                symbol: order.symbol.clone(),
                buy_order_id,
                sell_order_id,
                price,
                quantity: fill.quantity,
                created_at: now,
            });

            debug!(
                "Order {} matched {} against {} at {}",
                order.id, fill.quantity, fill.order_id, price
            );

            if fill.remaining == 0 {
                self.book.delete_order(&fill.order_id)?;
            }
        }

        if order.remaining_quantity > 0 {
            self.book.insert_order(order.clone())?;
        }

        debug!(
            "Order {} generated {} transactions, {} left",
            order.id,
            transactions.len(),
            order.remaining_quantity
        );
        Ok(Placement {
            order,
            transactions,
        })
    }

    /// Cancel a resting order and return it with its open quantity moved to
    /// `canceled_quantity`. Unknown ids leave the book untouched.
    pub fn cancel_order(&mut self, order_id: &str) -> OrderBookResult<Order> {
        let mut order = self.book.delete_order(order_id)?;
        let canceled = order.cancel(self.clock.now());

        debug!("Order {} cancelled, {} units released", order_id, canceled);
        Ok(order)
    }

    /// Best `n` levels per side.
    pub fn top_ticks(&self, n: usize) -> TopOfBook {
        self.book.top_of_book(n)
    }
}
