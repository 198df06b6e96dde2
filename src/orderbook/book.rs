use slab::Slab;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::orderbook::error::{OrderBookError, OrderBookResult};
use crate::orderbook::price_level::PriceLevel;
use crate::orderbook::types::{Order, OrderId, Price, Side, Tick, TopOfBook};

/// Limit order book for a single symbol.
///
/// Price levels are stored in a slab and addressed by their slab key. The two
/// `BTreeMap`s give each side its price ordering (bids are read from the high
/// end, asks from the low end), `price_index` resolves `(side, price)` to a
/// level without walking the tree, and `order_index` resolves an order id to
/// the level holding it.
#[derive(Debug)]
pub struct OrderBook {
    symbol: String,
    levels: Slab<PriceLevel>,
    bids: BTreeMap<Price, usize>,
    asks: BTreeMap<Price, usize>,
    price_index: HashMap<(Side, Price), usize>,
    order_index: HashMap<OrderId, usize>,
}

impl OrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        let symbol = symbol.into();
        info!("Creating new order book for symbol: {}", symbol);

        Self {
            symbol,
            levels: Slab::new(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            price_index: HashMap::new(),
            order_index: HashMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Whether `insert_order` would accept `order`: its id must not be
    /// resting anywhere in the book and its quantity must fit the level's
    /// aggregate. Nothing is modified.
    pub fn check_insert(&self, order: &Order) -> OrderBookResult<()> {
        if self.order_index.contains_key(&order.id) {
            return Err(OrderBookError::DuplicateOrder(order.id.clone()));
        }
        match self.price_index.get(&(order.side, order.price)) {
            Some(&key) => self.levels[key].check_add(order),
            None => Ok(()),
        }
    }

    /// Rest an order on its own side, creating its price level if needed.
    /// A rejected order leaves the book untouched.
    pub fn insert_order(&mut self, order: Order) -> OrderBookResult<()> {
        self.check_insert(&order)?;
        debug!(
            "Inserting order {} {} {}@{}",
            order.id, order.side, order.remaining_quantity, order.price
        );

        let side = order.side;
        let price = order.price;
        let order_id = order.id.clone();

        let key = match self.price_index.get(&(side, price)) {
            Some(&key) => {
                self.levels[key].add(order)?;
                key
            }
            None => {
                let mut level = PriceLevel::new(side, price);
                level.add(order)?;
                let key = self.levels.insert(level);
                self.prices_mut(side).insert(price, key);
                self.price_index.insert((side, price), key);
                debug!("Opened {} level at {}", side, price);
                key
            }
        };

        self.order_index.insert(order_id, key);
        Ok(())
    }

    /// Remove a resting order, dropping its level once the level is empty.
    pub fn delete_order(&mut self, order_id: &str) -> OrderBookResult<Order> {
        let key = *self
            .order_index
            .get(order_id)
            .ok_or_else(|| OrderBookError::OrderNotFound(order_id.to_string()))?;

        let level = &mut self.levels[key];
        let order = level.remove(order_id)?;
        let now_empty = level.is_empty();
        self.order_index.remove(order_id);

        if now_empty {
            self.unlink_level(key);
        }

        debug!("Deleted order {} from book", order_id);
        Ok(order)
    }

    /// Best `n` levels per side as (price, aggregate quantity).
    pub fn top_of_book(&self, n: usize) -> TopOfBook {
        TopOfBook {
            bids: self.levels(Side::Buy).take(n).map(Self::tick).collect(),
            asks: self.levels(Side::Sell).take(n).map(Self::tick).collect(),
        }
    }

    /// Levels of one side, best price first.
    pub fn levels(&self, side: Side) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        match side {
            Side::Buy => Box::new(self.bids.values().rev().map(|&key| &self.levels[key])),
            Side::Sell => Box::new(self.asks.values().map(|&key| &self.levels[key])),
        }
    }

    pub fn best_level(&self, side: Side) -> Option<&PriceLevel> {
        self.best_key(side).map(|key| &self.levels[key])
    }

    pub(crate) fn best_level_mut(&mut self, side: Side) -> Option<&mut PriceLevel> {
        let key = self.best_key(side)?;
        self.levels.get_mut(key)
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.last_key_value().map(|(price, _)| *price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first_key_value().map(|(price, _)| *price)
    }

    pub fn spread(&self) -> Option<Price> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) if ask > bid => Some(ask - bid),
            _ => None,
        }
    }

    pub fn contains(&self, order_id: &str) -> bool {
        self.order_index.contains_key(order_id)
    }

    pub fn get_order(&self, order_id: &str) -> Option<&Order> {
        let key = *self.order_index.get(order_id)?;
        self.levels[key].get(order_id)
    }

    /// Number of resting orders
    pub fn len(&self) -> usize {
        self.order_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order_index.is_empty()
    }

    pub fn level_count(&self, side: Side) -> usize {
        self.prices(side).len()
    }

    pub fn stats(&self) -> OrderBookStats {
        OrderBookStats {
            symbol: self.symbol.clone(),
            total_orders: self.len(),
            bid_levels: self.bids.len(),
            ask_levels: self.asks.len(),
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            spread: self.spread(),
        }
    }

    // Private helper methods

    fn tick(level: &PriceLevel) -> Tick {
        Tick {
            price: level.price(),
            quantity: level.total_quantity(),
        }
    }

    fn best_key(&self, side: Side) -> Option<usize> {
        match side {
            Side::Buy => self.bids.last_key_value().map(|(_, &key)| key),
            Side::Sell => self.asks.first_key_value().map(|(_, &key)| key),
        }
    }

    fn prices(&self, side: Side) -> &BTreeMap<Price, usize> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn prices_mut(&mut self, side: Side) -> &mut BTreeMap<Price, usize> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn unlink_level(&mut self, key: usize) {
        let level = self.levels.remove(key);
        let (side, price) = (level.side(), level.price());
        self.prices_mut(side).remove(&price);
        self.price_index.remove(&(side, price));
        debug!("Closed {} level at {}", side, price);
    }

    /// Panics if the sequences and the two indices disagree.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut seen = 0;
        for side in [Side::Buy, Side::Sell] {
            let prices: Vec<Price> = self.levels(side).map(|l| l.price()).collect();
            for pair in prices.windows(2) {
                match side {
                    Side::Buy => assert!(pair[0] > pair[1], "bids not descending"),
                    Side::Sell => assert!(pair[0] < pair[1], "asks not ascending"),
                }
            }

            for (price, &key) in self.prices(side) {
                let level = &self.levels[key];
                assert!(!level.is_empty(), "empty level left linked at {}", price);
                assert_eq!(level.price(), *price);
                assert_eq!(level.side(), side);
                assert_eq!(self.price_index.get(&(side, *price)), Some(&key));
                assert_eq!(
                    level.total_quantity(),
                    level.iter().map(|o| o.remaining_quantity).sum::<u64>()
                );
                for order in level.iter() {
                    assert!(order.remaining_quantity > 0);
                    assert_eq!(self.order_index.get(&order.id), Some(&key));
                    seen += 1;
                }
            }
        }
        assert_eq!(seen, self.order_index.len());
        assert_eq!(self.price_index.len(), self.bids.len() + self.asks.len());
        assert_eq!(self.levels.len(), self.price_index.len());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookStats {
    pub symbol: String,
    pub total_orders: usize,
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub spread: Option<Price>,
}
