//! Position types.
//!
//! A position is a member's holding of one side of one question. Regular
//! members hold at most one side per question at a time; the market maker
//! is the only account allowed to carry both.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MemberId, QuestionId, Side};

/// Primary key of a position row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PositionKey {
    pub member_id: MemberId,
    pub question_id: QuestionId,
    pub side: Side,
}

impl PositionKey {
    #[must_use]
    pub fn new(member_id: MemberId, question_id: QuestionId, side: Side) -> Self {
        Self {
            member_id,
            question_id,
            side,
        }
    }

    /// Same member and question, complementary side.
    #[must_use]
    pub fn opposite(&self) -> Self {
        Self {
            side: self.side.opposite(),
            ..*self
        }
    }
}

/// Holding of one side of one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub member_id: MemberId,
    pub question_id: QuestionId,
    pub side: Side,
    pub quantity: Decimal,
    /// Shares locked by resting SELL orders. Always `<= quantity`.
    pub reserved: Decimal,
    pub avg_price: Decimal,
    pub settled: bool,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// An empty position for `key`.
    #[must_use]
    pub fn empty(key: PositionKey) -> Self {
        Self {
            member_id: key.member_id,
            question_id: key.question_id,
            side: key.side,
            quantity: Decimal::ZERO,
            reserved: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            settled: false,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn key(&self) -> PositionKey {
        PositionKey::new(self.member_id, self.question_id, self.side)
    }

    /// Shares not locked by resting SELL orders.
    #[must_use]
    pub fn available(&self) -> Decimal {
        self.quantity - self.reserved
    }

    /// Cost basis (`quantity × avg_price`).
    #[must_use]
    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.avg_price
    }
}

/// A position marked to the current mid price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPnl {
    pub position: Position,
    /// Mark price on the position's own side.
    pub mark_price: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_excludes_reserved() {
        let mut pos = Position::empty(PositionKey::new(MemberId::new(), QuestionId::new(), Side::Yes));
        pos.quantity = Decimal::new(100, 0);
        pos.reserved = Decimal::new(30, 0);
        assert_eq!(pos.available(), Decimal::new(70, 0));
    }

    #[test]
    fn opposite_key_flips_side_only() {
        let key = PositionKey::new(MemberId::new(), QuestionId::new(), Side::No);
        let opp = key.opposite();
        assert_eq!(opp.side, Side::Yes);
        assert_eq!(opp.member_id, key.member_id);
        assert_eq!(opp.question_id, key.question_id);
    }

    #[test]
    fn cost_basis() {
        let mut pos = Position::empty(PositionKey::new(MemberId::new(), QuestionId::new(), Side::Yes));
        pos.quantity = Decimal::new(50, 0);
        pos.avg_price = Decimal::new(42, 2);
        assert_eq!(pos.cost_basis(), Decimal::new(21, 0));
    }
}
