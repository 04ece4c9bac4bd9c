//! A single price level of the YES-axis book.
//!
//! Orders at the same price are stored in FIFO order (arrival sequence)
//! using a [`VecDeque`].

use std::collections::VecDeque;

use predmatch_types::Order;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All resting orders that sit at one YES-axis price.
///
/// Orders are stored in arrival order -- the front of the deque is the
/// oldest order.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    /// YES-axis price of this level.
    pub price: Decimal,
    /// Orders in arrival order (front = oldest).
    pub orders: VecDeque<Order>,
}

impl PriceLevel {
    #[must_use]
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
        }
    }

    /// Add an order to the back of this level.
    pub fn push_back(&mut self, order: Order) {
        self.orders.push_back(order);
    }

    #[must_use]
    pub fn front(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Total remaining quantity across all orders at this level.
    #[must_use]
    pub fn total_quantity(&self) -> Decimal {
        self.orders.iter().map(|o| o.remaining).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Number of orders at this level.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Aggregated view of this level.
    #[must_use]
    pub fn snapshot(&self) -> LevelSnapshot {
        LevelSnapshot {
            price: self.price,
            quantity: self.total_quantity(),
            order_count: self.len(),
        }
    }
}

/// `{price, quantity, order_count}` row of a book snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub price: Decimal,
    /// Sum of remaining quantity.
    pub quantity: Decimal,
    pub order_count: usize,
}

#[cfg(test)]
mod tests {
    use predmatch_types::*;
    use rust_decimal::Decimal;

    use super::*;

    fn make_order(price: Decimal, qty: Decimal, seq: u64) -> Order {
        let mut order = Order::dummy_limit(Side::Yes, Direction::Buy, price, qty);
        order.sequence = seq;
        order
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut level = PriceLevel::new(Decimal::new(50, 2));
        let o1 = make_order(Decimal::new(50, 2), Decimal::ONE, 1);
        let o2 = make_order(Decimal::new(50, 2), Decimal::ONE, 2);
        let id1 = o1.id;
        level.push_back(o1);
        level.push_back(o2);
        assert_eq!(level.front().unwrap().id, id1, "oldest order sits at the front");
        assert_eq!(level.len(), 2);
    }

    #[test]
    fn snapshot_sums_remaining() {
        let mut level = PriceLevel::new(Decimal::new(48, 2));
        let mut partly = make_order(Decimal::new(48, 2), Decimal::new(200, 0), 1);
        partly.apply_fill(Decimal::new(50, 0), chrono::Utc::now());
        level.push_back(partly);
        level.push_back(make_order(Decimal::new(48, 2), Decimal::new(30, 0), 2));

        let snap = level.snapshot();
        assert_eq!(snap.quantity, Decimal::new(180, 0));
        assert_eq!(snap.order_count, 2);
        assert_eq!(snap.price, Decimal::new(48, 2));
    }

    #[test]
    fn empty_level() {
        let level = PriceLevel::new(Decimal::new(10, 2));
        assert!(level.is_empty());
        assert_eq!(level.total_quantity(), Decimal::ZERO);
        assert!(level.front().is_none());
    }
}
