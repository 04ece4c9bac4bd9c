//! Trade records produced by the matching engine.
//!
//! A [`Trade`] is the immutable record of one fill between an incoming
//! (taker) order and a resting (maker) order. It always executes at the
//! taker's price, expressed in the taker's side.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Direction, MemberId, OrderId, QuestionId, Side, TradeId};

/// A single fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub question_id: QuestionId,
    /// The incoming order.
    pub taker_order_id: OrderId,
    pub taker_member_id: MemberId,
    /// The resting order.
    pub maker_order_id: OrderId,
    pub maker_member_id: MemberId,
    /// Execution price on the taker's side.
    pub price: Decimal,
    pub quantity: Decimal,
    pub taker_side: Side,
    pub taker_direction: Direction,
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    /// Amount paid (or received) by the taker.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }

    /// Execution price mirrored onto the YES axis.
    #[must_use]
    pub fn yes_price(&self) -> Decimal {
        match self.taker_side {
            Side::Yes => self.price,
            Side::No => Decimal::ONE - self.price,
        }
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade[{}] {} {} {} @ {}",
            self.id, self.taker_direction, self.taker_side, self.quantity, self.price,
        )
    }
}

/// A price-history sample appended after every matching pass that filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub question_id: QuestionId,
    /// Mid price on the YES axis, if both sides of the book were populated.
    pub mid_price: Option<Decimal>,
    /// Last trade price on the YES axis.
    pub last_price: Decimal,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_trade(side: Side) -> Trade {
        Trade {
            id: TradeId::new(),
            question_id: QuestionId::new(),
            taker_order_id: OrderId::new(),
            taker_member_id: MemberId::new(),
            maker_order_id: OrderId::new(),
            maker_member_id: MemberId::new(),
            price: Decimal::new(60, 2),
            quantity: Decimal::new(100, 0),
            taker_side: side,
            taker_direction: Direction::Buy,
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn trade_notional() {
        assert_eq!(make_trade(Side::Yes).notional(), Decimal::new(60, 0));
    }

    #[test]
    fn yes_price_mirrors_no_trades() {
        assert_eq!(make_trade(Side::Yes).yes_price(), Decimal::new(60, 2));
        assert_eq!(make_trade(Side::No).yes_price(), Decimal::new(40, 2));
    }

    #[test]
    fn trade_display() {
        let s = format!("{}", make_trade(Side::Yes));
        assert!(s.contains("BUY YES"));
        assert!(s.contains("0.60"));
    }
}
