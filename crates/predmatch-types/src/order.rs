//! Order types for the PredMatch matching engine.
//!
//! Prices are the cost of one share of the order's side and always lie in
//! the open interval (0, 1). A MARKET order carries the price derived from
//! the book at acceptance time, so every stored order has a concrete price.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MemberId, OrderId, PredmatchError, QuestionId, Result};

/// One of the two complementary outcomes of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// The complementary outcome.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "YES"),
            Self::No => write!(f, "NO"),
        }
    }
}

/// Whether the order acquires or liquidates exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// The type of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    /// Immediate-or-cancel at the best available price.
    Market,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limit => write!(f, "LIMIT"),
            Self::Market => write!(f, "MARKET"),
        }
    }
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    Partial,
    Filled,
    Cancelled,
}

impl OrderStatus {
    /// Open and partially filled orders rest in the book.
    #[must_use]
    pub fn is_resting(self) -> bool {
        matches!(self, Self::Open | Self::Partial)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !self.is_resting()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Partial => write!(f, "PARTIAL"),
            Self::Filled => write!(f, "FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A resting or historical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub member_id: MemberId,
    pub question_id: QuestionId,
    pub kind: OrderKind,
    pub side: Side,
    pub direction: Direction,
    pub price: Decimal,
    pub quantity: Decimal,
    pub remaining: Decimal,
    pub status: OrderStatus,
    /// Arrival sequence; breaks price ties (earlier first).
    pub sequence: u64,
    /// Optimistic-concurrency version, bumped on every committed write.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A freshly accepted order with nothing filled.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        member_id: MemberId,
        question_id: QuestionId,
        kind: OrderKind,
        side: Side,
        direction: Direction,
        price: Decimal,
        quantity: Decimal,
        sequence: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            member_id,
            question_id,
            kind,
            side,
            direction,
            price,
            quantity,
            remaining: quantity,
            status: OrderStatus::Open,
            sequence,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The price of this order expressed on the YES axis.
    ///
    /// BUY YES / SELL YES keep their price; NO orders are mirrored to
    /// `1 - price`.
    #[must_use]
    pub fn yes_axis_price(&self) -> Decimal {
        match self.side {
            Side::Yes => self.price,
            Side::No => Decimal::ONE - self.price,
        }
    }

    /// Whether this order adds demand for YES (a bid on the YES axis).
    #[must_use]
    pub fn is_yes_bid(&self) -> bool {
        matches!(
            (self.side, self.direction),
            (Side::Yes, Direction::Buy) | (Side::No, Direction::Sell)
        )
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.remaining.is_zero()
    }

    #[must_use]
    pub fn filled_qty(&self) -> Decimal {
        self.quantity - self.remaining
    }

    /// Funds still reserved by a BUY order (`remaining × price`).
    #[must_use]
    pub fn reserved_funds(&self) -> Decimal {
        match self.direction {
            Direction::Buy => self.remaining * self.price,
            Direction::Sell => Decimal::ZERO,
        }
    }

    /// Apply a fill, updating `remaining` and `status`.
    ///
    /// The caller guarantees `qty <= remaining`.
    pub fn apply_fill(&mut self, qty: Decimal, at: DateTime<Utc>) {
        self.remaining -= qty;
        self.status = if self.remaining.is_zero() {
            OrderStatus::Filled
        } else if self.remaining < self.quantity {
            OrderStatus::Partial
        } else {
            OrderStatus::Open
        };
        self.updated_at = at;
    }

    /// Cancel whatever is left. Returns the cancelled quantity.
    pub fn cancel_remaining(&mut self, at: DateTime<Utc>) -> Decimal {
        let cancelled = self.remaining;
        self.remaining = Decimal::ZERO;
        self.status = OrderStatus::Cancelled;
        self.updated_at = at;
        cancelled
    }
}

/// An order as submitted, before acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub member_id: MemberId,
    pub question_id: QuestionId,
    pub kind: OrderKind,
    pub side: Side,
    pub direction: Direction,
    /// Required for LIMIT orders; ignored for MARKET orders.
    pub price: Option<Decimal>,
    pub quantity: Decimal,
}

impl OrderRequest {
    #[must_use]
    pub fn limit(
        member_id: MemberId,
        question_id: QuestionId,
        side: Side,
        direction: Direction,
        price: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self {
            member_id,
            question_id,
            kind: OrderKind::Limit,
            side,
            direction,
            price: Some(price),
            quantity,
        }
    }

    #[must_use]
    pub fn market(
        member_id: MemberId,
        question_id: QuestionId,
        side: Side,
        direction: Direction,
        quantity: Decimal,
    ) -> Self {
        Self {
            member_id,
            question_id,
            kind: OrderKind::Market,
            side,
            direction,
            price: None,
            quantity,
        }
    }

    /// Shape checks that need no market state.
    ///
    /// # Errors
    /// `InvalidOrder` for a non-positive quantity, or a LIMIT order whose
    /// price is missing or outside (0, 1).
    pub fn validate(&self) -> Result<()> {
        if self.quantity <= Decimal::ZERO {
            return Err(PredmatchError::InvalidOrder {
                reason: format!("Quantity must be positive, got {}", self.quantity),
            });
        }
        if self.kind == OrderKind::Limit {
            match self.price {
                None => {
                    return Err(PredmatchError::InvalidOrder {
                        reason: "Limit order requires a price".into(),
                    });
                }
                Some(p) if p <= Decimal::ZERO || p >= Decimal::ONE => {
                    return Err(PredmatchError::InvalidOrder {
                        reason: format!("Price must lie strictly between 0 and 1, got {p}"),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy_limit(side: Side, direction: Direction, price: Decimal, qty: Decimal) -> Self {
        Self::new(
            MemberId::new(),
            QuestionId::new(),
            OrderKind::Limit,
            side,
            direction,
            price,
            qty,
            0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Yes.opposite(), Side::No);
        assert_eq!(Side::No.opposite(), Side::Yes);
    }

    #[test]
    fn display_is_upper_case() {
        assert_eq!(format!("{}", Side::Yes), "YES");
        assert_eq!(format!("{}", Direction::Sell), "SELL");
        assert_eq!(format!("{}", OrderKind::Market), "MARKET");
        assert_eq!(format!("{}", OrderStatus::Partial), "PARTIAL");
    }

    #[test]
    fn yes_axis_mirrors_no_orders() {
        let no_bid = Order::dummy_limit(Side::No, Direction::Buy, Decimal::new(40, 2), Decimal::ONE);
        assert_eq!(no_bid.yes_axis_price(), Decimal::new(60, 2));
        assert!(!no_bid.is_yes_bid());

        let no_ask = Order::dummy_limit(Side::No, Direction::Sell, Decimal::new(52, 2), Decimal::ONE);
        assert_eq!(no_ask.yes_axis_price(), Decimal::new(48, 2));
        assert!(no_ask.is_yes_bid());
    }

    #[test]
    fn fill_tracking() {
        let mut order = Order::dummy_limit(Side::Yes, Direction::Buy, Decimal::new(60, 2), Decimal::new(100, 0));
        let now = Utc::now();

        order.apply_fill(Decimal::new(30, 0), now);
        assert_eq!(order.status, OrderStatus::Partial);
        assert_eq!(order.filled_qty(), Decimal::new(30, 0));
        assert_eq!(order.reserved_funds(), Decimal::new(42, 0));

        order.apply_fill(Decimal::new(70, 0), now);
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.is_filled());
        assert!(order.status.is_terminal());
    }

    #[test]
    fn cancel_zeroes_remaining() {
        let mut order = Order::dummy_limit(Side::No, Direction::Buy, Decimal::new(25, 2), Decimal::new(8, 0));
        let cancelled = order.cancel_remaining(Utc::now());
        assert_eq!(cancelled, Decimal::new(8, 0));
        assert_eq!(order.remaining, Decimal::ZERO);
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[test]
    fn sell_orders_reserve_no_funds() {
        let order = Order::dummy_limit(Side::Yes, Direction::Sell, Decimal::new(52, 2), Decimal::new(10, 0));
        assert_eq!(order.reserved_funds(), Decimal::ZERO);
    }

    #[test]
    fn request_validation() {
        let m = MemberId::new();
        let q = QuestionId::new();
        let ok = OrderRequest::limit(m, q, Side::Yes, Direction::Buy, Decimal::new(60, 2), Decimal::TEN);
        assert!(ok.validate().is_ok());

        let edge = OrderRequest::limit(m, q, Side::Yes, Direction::Buy, Decimal::ONE, Decimal::TEN);
        assert!(matches!(edge.validate(), Err(PredmatchError::InvalidOrder { .. })));

        let zero = OrderRequest::market(m, q, Side::No, Direction::Sell, Decimal::ZERO);
        assert!(zero.validate().is_err());

        let market = OrderRequest::market(m, q, Side::No, Direction::Buy, Decimal::new(50, 0));
        assert!(market.validate().is_ok(), "market orders carry no price");
    }
}
