//! Position accounting.
//!
//! Merges fills into per-member, per-question, per-side holdings and keeps
//! the single-sided invariant: a regular member never holds YES and NO of
//! the same question at once. A fill on one side first nets against the
//! member's unreserved opposite holding; only the excess opens the new
//! side. The market-maker account is exempt and may hold both sides.
//!
//! Every mutation returns a [`PositionUpdate`] so the caller can write the
//! audit trail after commit.

use chrono::Utc;
use predmatch_persistence::{Store, UnitOfWork};
use predmatch_types::{
    MemberId, Position, PositionKey, PositionPnl, PredmatchError, QuestionId, Result, Side,
    constants,
};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::OrderBook;

/// Description of one position mutation, for the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub key: PositionKey,
    pub detail: String,
}

impl PositionUpdate {
    fn new(key: PositionKey, detail: String) -> Self {
        Self { key, detail }
    }
}

/// Position bookkeeping rules.
#[derive(Debug, Clone)]
pub struct PositionLedger {
    market_maker: MemberId,
}

impl PositionLedger {
    #[must_use]
    pub fn new(market_maker: MemberId) -> Self {
        Self { market_maker }
    }

    // =================================================================
    // Mutations (staged on a unit of work)
    // =================================================================

    /// Merge a BUY fill of `qty` at `price` into the member's holding.
    ///
    /// # Errors
    /// `NettingViolation` if netting would consume opposite shares that
    /// are reserved by resting SELL orders.
    pub fn apply_fill(&self, uow: &mut UnitOfWork<'_>, key: PositionKey, qty: Decimal, price: Decimal) -> Result<PositionUpdate> {
        if key.member_id != self.market_maker {
            if let Some(opposite) = uow.position(key.opposite()).filter(|p| p.quantity > Decimal::ZERO) {
                return Self::net_against(uow, key, opposite, qty, price);
            }
        }
        Self::merge(uow, key, qty, price);
        Ok(PositionUpdate::new(key, format!("{} +{qty} @ {price}", key.side)))
    }

    fn net_against(
        uow: &mut UnitOfWork<'_>,
        key: PositionKey,
        mut opposite: Position,
        qty: Decimal,
        price: Decimal,
    ) -> Result<PositionUpdate> {
        let opposite_key = opposite.key();
        if qty <= opposite.available() {
            opposite.quantity -= qty;
            opposite.updated_at = Utc::now();
            if opposite.quantity.is_zero() {
                uow.delete_position(opposite_key, opposite.version);
            } else {
                uow.put_position(opposite);
            }
            return Ok(PositionUpdate::new(
                key,
                format!("{} +{qty} netted against {}", key.side, opposite_key.side),
            ));
        }
        if opposite.reserved > Decimal::ZERO {
            return Err(PredmatchError::NettingViolation {
                reason: format!(
                    "{} fill of {qty} would net into {} reserved {} shares",
                    key.side, opposite.reserved, opposite_key.side
                ),
            });
        }
        let netted = opposite.quantity;
        let excess = qty - netted;
        uow.delete_position(opposite_key, opposite.version);
        Self::merge(uow, key, excess, price);
        Ok(PositionUpdate::new(
            key,
            format!("{} +{qty} netted {netted} against {}, opened {excess} @ {price}", key.side, opposite_key.side),
        ))
    }

    /// Weighted-average merge, average rounded to 2 dp half-up.
    fn merge(uow: &mut UnitOfWork<'_>, key: PositionKey, qty: Decimal, price: Decimal) {
        let mut pos = uow.position(key).unwrap_or_else(|| Position::empty(key));
        let new_qty = pos.quantity + qty;
        if !new_qty.is_zero() {
            pos.avg_price = ((pos.quantity * pos.avg_price + qty * price) / new_qty)
                .round_dp_with_strategy(constants::AVG_PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
        }
        pos.quantity = new_qty;
        pos.updated_at = Utc::now();
        uow.put_position(pos);
    }

    /// Remove sold shares: `qty ≤ reserved ≤ quantity`. The row is removed
    /// at zero.
    ///
    /// # Errors
    /// `InsufficientPosition` if fewer than `qty` shares are reserved.
    pub fn release_on_sell(&self, uow: &mut UnitOfWork<'_>, key: PositionKey, qty: Decimal) -> Result<PositionUpdate> {
        let mut pos = uow.position(key).ok_or(PredmatchError::InsufficientPosition {
            needed: qty,
            available: Decimal::ZERO,
        })?;
        if qty > pos.reserved || pos.reserved > pos.quantity {
            return Err(PredmatchError::InsufficientPosition {
                needed: qty,
                available: pos.reserved,
            });
        }
        pos.reserved -= qty;
        pos.quantity -= qty;
        pos.updated_at = Utc::now();
        if pos.quantity.is_zero() {
            uow.delete_position(key, pos.version);
        } else {
            uow.put_position(pos);
        }
        Ok(PositionUpdate::new(key, format!("{} -{qty} sold", key.side)))
    }

    /// Lock shares for a resting SELL order.
    ///
    /// # Errors
    /// `InsufficientPosition` if fewer than `qty` unreserved shares are held.
    pub fn reserve_for_sell(&self, uow: &mut UnitOfWork<'_>, key: PositionKey, qty: Decimal) -> Result<PositionUpdate> {
        let mut pos = uow.position(key).unwrap_or_else(|| Position::empty(key));
        if pos.available() < qty {
            return Err(PredmatchError::InsufficientPosition {
                needed: qty,
                available: pos.available(),
            });
        }
        pos.reserved += qty;
        pos.updated_at = Utc::now();
        uow.put_position(pos);
        Ok(PositionUpdate::new(key, format!("{} reserved {qty}", key.side)))
    }

    /// Unlock shares of a cancelled SELL order (clamped at zero).
    pub fn release_reservation(&self, uow: &mut UnitOfWork<'_>, key: PositionKey, qty: Decimal) -> Option<PositionUpdate> {
        let mut pos = uow.position(key)?;
        let released = qty.min(pos.reserved);
        pos.reserved = (pos.reserved - qty).max(Decimal::ZERO);
        pos.updated_at = Utc::now();
        uow.put_position(pos);
        Some(PositionUpdate::new(key, format!("{} released {released}", key.side)))
    }

    /// House inventory at average cost 0.
    pub fn grant_inventory(&self, uow: &mut UnitOfWork<'_>, key: PositionKey, qty: Decimal) -> PositionUpdate {
        Self::merge(uow, key, qty, Decimal::ZERO);
        PositionUpdate::new(key, format!("{} granted {qty}", key.side))
    }

    /// Flag every unsettled position of a question as settled. Returns
    /// the number flagged.
    pub fn mark_settled(&self, uow: &mut UnitOfWork<'_>, question_id: QuestionId) -> usize {
        let open: Vec<Position> = uow
            .positions_for_question(question_id)
            .into_iter()
            .filter(|p| !p.settled)
            .collect();
        let count = open.len();
        for mut pos in open {
            pos.settled = true;
            pos.updated_at = Utc::now();
            uow.put_position(pos);
        }
        count
    }

    // =================================================================
    // Queries (committed state)
    // =================================================================

    #[must_use]
    pub fn positions_for_member(&self, store: &Store, member_id: MemberId) -> Vec<Position> {
        store.positions_for_member(member_id)
    }

    #[must_use]
    pub fn positions_for_member_question(&self, store: &Store, member_id: MemberId, question_id: QuestionId) -> Vec<Position> {
        [Side::Yes, Side::No]
            .into_iter()
            .filter_map(|side| store.position(PositionKey::new(member_id, question_id, side)))
            .collect()
    }

    #[must_use]
    pub fn positions_for_question(&self, store: &Store, question_id: QuestionId) -> Vec<Position> {
        store.positions_for_question(question_id)
    }

    /// A member's positions marked to each question's current mid price.
    #[must_use]
    pub fn positions_with_pnl(&self, store: &Store, member_id: MemberId) -> Vec<PositionPnl> {
        store
            .positions_for_member(member_id)
            .into_iter()
            .map(|position| {
                let mid = OrderBook::load(store, position.question_id)
                    .ok()
                    .and_then(|book| book.mid_price());
                let mark_price = mid.map(|m| match position.side {
                    Side::Yes => m,
                    Side::No => Decimal::ONE - m,
                });
                let unrealized_pnl = mark_price.map(|mark| (mark - position.avg_price) * position.quantity);
                PositionPnl {
                    position,
                    mark_price,
                    unrealized_pnl,
                }
            })
            .collect()
    }
}
