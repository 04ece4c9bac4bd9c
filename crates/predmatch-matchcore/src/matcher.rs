//! The matching engine.
//!
//! Accepts orders, finds complementary counter-orders, executes fills and
//! commits everything (orders, trades, balances, positions, pools, price
//! history) in one unit of work per submission.
//!
//! ## Crossing Rule
//!
//! For a taker on side `S` at price `P` (`S'` is the other side):
//!
//! ```text
//! BUY  S @ P  ×  resting BUY  S' @ q   if q ≥ 1 - P   (mint, effective ask 1 - q)
//! BUY  S @ P  ×  resting SELL S  @ p   if p ≤ P       (effective ask p)
//!     → effective ask ascending, then arrival sequence
//! SELL S @ P  ×  resting BUY  S  @ p   if p ≥ P
//!     → price descending, then arrival sequence
//! ```
//!
//! SELL never meets SELL, and orders of the same member never meet.
//!
//! ## Execution
//!
//! Every fill executes at the taker's price. A maker BUY filled below its
//! limit gets the difference unfrozen, so a resting BUY always reserves
//! exactly `remaining × price`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use predmatch_ingress::{AuditTrail, PauseRegistry, RiskGuard};
use predmatch_persistence::{RetryPolicy, Store, UnitOfWork};
use predmatch_types::{
    AuditAction, Direction, EngineConfig, LedgerKind, MemberId, Order, OrderId, OrderKind,
    OrderRequest, OrderStatus, PositionKey, PredmatchError, PricePoint, QuestionId,
    QuestionStatus, Result, RiskDecision, Side, Trade, TradeId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::orderbook::{OrderBookSnapshot, PriceInfo};
use crate::position_ledger::PositionUpdate;
use crate::{OrderBook, PositionLedger};

// =====================================================================
// Results
// =====================================================================

/// Result of an accepted submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    /// Quantity left resting in the book (0 for filled or cancelled orders).
    pub remaining_quantity: Decimal,
    pub trades: Vec<Trade>,
    pub message: String,
}

/// API-facing order response; never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub success: bool,
    pub message: String,
    pub order_id: Option<OrderId>,
    pub filled_qty: Decimal,
    pub remaining_qty: Decimal,
}

/// API-facing cancel response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelResponse {
    pub success: bool,
    pub message: String,
    pub refunded_amount: Decimal,
}

/// One committed attempt plus what must be audited afterwards.
struct Committed<T> {
    value: T,
    updates: Vec<PositionUpdate>,
}

/// A resting order eligible to fill a taker.
#[derive(Debug, Clone)]
pub struct Counter {
    /// Price per share in the taker's side.
    pub effective_price: Decimal,
    pub order: Order,
}

// =====================================================================
// Counter selection
// =====================================================================

/// What the taker pays (BUY) or receives (SELL) per share of its own side
/// when filled by `maker`, or `None` if the two never match.
#[must_use]
pub fn effective_price(taker_side: Side, taker_direction: Direction, maker: &Order) -> Option<Decimal> {
    match (taker_direction, maker.direction) {
        (Direction::Buy, Direction::Buy) if maker.side != taker_side => Some(Decimal::ONE - maker.price),
        (Direction::Buy, Direction::Sell) | (Direction::Sell, Direction::Buy) if maker.side == taker_side => {
            Some(maker.price)
        }
        _ => None,
    }
}

/// Resting orders that cross `taker`, best first.
#[must_use]
pub fn crossing_counters(taker: &Order, resting: Vec<Order>) -> Vec<Counter> {
    let mut counters: Vec<Counter> = resting
        .into_iter()
        .filter(|o| o.id != taker.id && o.member_id != taker.member_id && o.status.is_resting())
        .filter_map(|order| {
            let effective_price = effective_price(taker.side, taker.direction, &order)?;
            let crosses = match taker.direction {
                Direction::Buy => effective_price <= taker.price,
                Direction::Sell => effective_price >= taker.price,
            };
            crosses.then_some(Counter { effective_price, order })
        })
        .collect();
    match taker.direction {
        Direction::Buy => counters.sort_by(|a, b| {
            a.effective_price
                .cmp(&b.effective_price)
                .then(a.order.sequence.cmp(&b.order.sequence))
        }),
        Direction::Sell => counters.sort_by(|a, b| {
            b.effective_price
                .cmp(&a.effective_price)
                .then(a.order.sequence.cmp(&b.order.sequence))
        }),
    }
    counters
}

/// Best executable price for a MARKET order: lowest effective ask for a
/// BUY, highest bid for a SELL. Own orders are skipped.
#[must_use]
pub fn best_counter_price(request: &OrderRequest, resting: &[Order]) -> Option<Decimal> {
    let prices = resting
        .iter()
        .filter(|o| o.member_id != request.member_id && o.status.is_resting())
        .filter_map(|o| effective_price(request.side, request.direction, o));
    match request.direction {
        Direction::Buy => prices.min(),
        Direction::Sell => prices.max(),
    }
}

fn outcome_message(kind: OrderKind, filled: Decimal, requested: Decimal) -> String {
    match kind {
        _ if filled == requested => "Order completely filled.".to_string(),
        OrderKind::Market if filled > Decimal::ZERO => {
            format!("Market order partially filled. ({filled}/{requested}, unfilled portion auto-cancelled)")
        }
        OrderKind::Market => "Market order was not filled. (Cancelled immediately)".to_string(),
        OrderKind::Limit if filled > Decimal::ZERO => format!("Partially filled. ({filled}/{requested})"),
        OrderKind::Limit => "Order added to order book.".to_string(),
    }
}

// =====================================================================
// Engine
// =====================================================================

/// Order entry, matching and cancellation for every question.
pub struct MatchingEngine {
    store: Arc<Store>,
    risk: RiskGuard,
    pause: Arc<PauseRegistry>,
    audit: Arc<dyn AuditTrail>,
    positions: PositionLedger,
    retry: RetryPolicy,
    market_maker: MemberId,
}

impl std::fmt::Debug for MatchingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchingEngine")
            .field("risk", &self.risk)
            .field("retry", &self.retry)
            .field("market_maker", &self.market_maker)
            .finish_non_exhaustive()
    }
}

impl MatchingEngine {
    #[must_use]
    pub fn new(store: Arc<Store>, config: &EngineConfig, pause: Arc<PauseRegistry>, audit: Arc<dyn AuditTrail>) -> Self {
        let market_maker = config.market_maker.member_id;
        Self {
            risk: RiskGuard::new(config.risk.clone(), market_maker, Arc::clone(&audit)),
            positions: PositionLedger::new(market_maker),
            retry: RetryPolicy::from(&config.retry),
            store,
            pause,
            audit,
            market_maker,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    #[must_use]
    pub fn audit(&self) -> &Arc<dyn AuditTrail> {
        &self.audit
    }

    #[must_use]
    pub fn positions(&self) -> &PositionLedger {
        &self.positions
    }

    #[must_use]
    pub fn risk_guard(&self) -> &RiskGuard {
        &self.risk
    }

    #[must_use]
    pub fn pause_registry(&self) -> &PauseRegistry {
        &self.pause
    }

    #[must_use]
    pub fn market_maker(&self) -> MemberId {
        self.market_maker
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    // =================================================================
    // Order entry
    // =================================================================

    /// Submit an order now.
    pub fn submit(&self, request: &OrderRequest) -> Result<SubmitOutcome> {
        self.submit_at(request, Utc::now())
    }

    /// Submit an order as of `now` (expiry, trade timestamps and the
    /// circuit-breaker window all use it).
    ///
    /// # Errors
    /// Validation, pause, lifecycle, risk, funds/position and netting
    /// failures; `RetriesExhausted` after repeated version conflicts.
    pub fn submit_at(&self, request: &OrderRequest, now: DateTime<Utc>) -> Result<SubmitOutcome> {
        request.validate()?;
        let result = self.pause.ensure_open(request.question_id).and_then(|()| {
            let lock = self.store.question_lock(request.question_id);
            self.retry.run_locked(&lock, || {
                let committed = self.try_submit(request, now)?;
                // Before the lock is released, so the next submission on
                // this question is checked against these trades.
                if !committed.value.trades.is_empty() {
                    self.risk
                        .breaker()
                        .record_trades(request.question_id, committed.value.trades.iter().map(|t| t.executed_at));
                }
                Ok(committed)
            })
        });

        match result {
            Ok(committed) => {
                self.after_submit(request, &committed);
                Ok(committed.value)
            }
            Err(err) => {
                tracing::warn!(
                    member = %request.member_id,
                    question = %request.question_id,
                    error = %err,
                    "Order rejected"
                );
                // Risk rejections are already audited by the guard.
                if err.is_business_rule() && !matches!(err, PredmatchError::RiskRejected(_)) {
                    self.audit.log(
                        Some(request.member_id),
                        AuditAction::OrderReject,
                        "ORDER",
                        None,
                        &err.to_string(),
                    );
                }
                Err(err)
            }
        }
    }

    /// Submit and wrap the result for the API.
    pub fn create_order(&self, request: &OrderRequest) -> OrderResponse {
        match self.submit(request) {
            Ok(outcome) => OrderResponse {
                success: true,
                message: outcome.message,
                order_id: Some(outcome.order_id),
                filled_qty: outcome.filled_quantity,
                remaining_qty: outcome.remaining_quantity,
            },
            Err(err) => OrderResponse {
                success: false,
                message: match err {
                    PredmatchError::RiskRejected(reason) => reason.to_string(),
                    other => other.to_string(),
                },
                order_id: None,
                filled_qty: Decimal::ZERO,
                remaining_qty: Decimal::ZERO,
            },
        }
    }

    #[allow(clippy::too_many_lines)]
    fn try_submit(&self, request: &OrderRequest, now: DateTime<Utc>) -> Result<Committed<SubmitOutcome>> {
        let mut uow = self.store.begin();
        let mut question = uow.require_question(request.question_id)?;
        if question.status != QuestionStatus::Betting {
            return Err(PredmatchError::MarketNotTrading {
                status: question.status,
            });
        }
        if question.is_expired(now) {
            return Err(PredmatchError::MarketExpired);
        }

        let resting = uow.resting_orders(question.id);
        let price = match request.kind {
            OrderKind::Limit => request.price.ok_or_else(|| PredmatchError::InvalidOrder {
                reason: "Limit order requires a price".into(),
            })?,
            OrderKind::Market => best_counter_price(request, &resting).ok_or(PredmatchError::NoExecutableQuotes)?,
        };

        // 1. Risk gate
        let exposure: Decimal = [Side::Yes, Side::No]
            .into_iter()
            .filter_map(|side| uow.position(PositionKey::new(request.member_id, question.id, side)))
            .map(|p| p.quantity)
            .sum();
        if let RiskDecision::Rejected { reason } = self.risk.evaluate(request, price, exposure, now) {
            return Err(PredmatchError::RiskRejected(reason));
        }

        // 2. Single-sided exposure
        self.check_netting(&uow, request, &resting)?;

        // 3. Reserve funds or shares
        let mut updates = Vec::new();
        match request.direction {
            Direction::Buy => {
                let amount = request.quantity * price;
                uow.freeze(request.member_id, amount)?;
                uow.record_movement(
                    request.member_id,
                    LedgerKind::Bet,
                    -amount,
                    format!("BUY {} {} @ {price}", request.side, request.quantity),
                    Some(question.id),
                );
            }
            Direction::Sell => {
                let key = PositionKey::new(request.member_id, question.id, request.side);
                updates.push(self.positions.reserve_for_sell(&mut uow, key, request.quantity)?);
            }
        }

        // 4. Match
        let mut taker = Order::new(
            request.member_id,
            question.id,
            request.kind,
            request.side,
            request.direction,
            price,
            request.quantity,
            self.store.next_sequence(),
        );
        taker.created_at = now;
        taker.updated_at = now;

        let trades = self.match_order(&mut uow, &mut taker, resting, now, &mut updates)?;
        let filled = taker.filled_qty();

        // 5. MARKET orders are immediate-or-cancel
        if taker.kind == OrderKind::Market && !taker.remaining.is_zero() {
            self.release_remainder(&mut uow, &mut taker, now, &mut updates)?;
        }
        uow.put_order(taker.clone());

        // 6. Pools and price history
        if let Some(last) = trades.last() {
            if taker.direction == Direction::Buy {
                question.pools.add(taker.side, filled);
                uow.put_question(question);
            }
            let book = OrderBook::from_orders(request.question_id, uow.resting_orders(request.question_id));
            uow.record_price_point(PricePoint {
                question_id: request.question_id,
                mid_price: book.mid_price(),
                last_price: last.yes_price(),
                recorded_at: now,
            });
        }

        uow.commit()?;

        Ok(Committed {
            value: SubmitOutcome {
                order_id: taker.id,
                status: taker.status,
                filled_quantity: filled,
                remaining_quantity: taker.remaining,
                message: outcome_message(taker.kind, filled, taker.quantity),
                trades,
            },
            updates,
        })
    }

    /// Regular members may not build exposure on both sides of a question.
    fn check_netting(&self, uow: &UnitOfWork<'_>, request: &OrderRequest, resting: &[Order]) -> Result<()> {
        if request.member_id == self.market_maker {
            return Ok(());
        }
        let opposite = request.side.opposite();
        match request.direction {
            Direction::Buy => {
                let reserved = uow
                    .position(PositionKey::new(request.member_id, request.question_id, opposite))
                    .map_or(Decimal::ZERO, |p| p.reserved);
                if reserved > Decimal::ZERO {
                    return Err(PredmatchError::NettingViolation {
                        reason: format!("cannot buy {} while {reserved} {opposite} shares are listed for sale", request.side),
                    });
                }
            }
            Direction::Sell => {
                let conflicting = resting.iter().any(|o| {
                    o.member_id == request.member_id && o.direction == Direction::Buy && o.side == opposite
                });
                if conflicting {
                    return Err(PredmatchError::NettingViolation {
                        reason: format!("cannot sell {} while a BUY {opposite} order is resting", request.side),
                    });
                }
            }
        }
        Ok(())
    }

    /// Walk crossing counters and fill the taker.
    fn match_order(
        &self,
        uow: &mut UnitOfWork<'_>,
        taker: &mut Order,
        resting: Vec<Order>,
        now: DateTime<Utc>,
        updates: &mut Vec<PositionUpdate>,
    ) -> Result<Vec<Trade>> {
        let mut trades = Vec::new();
        for Counter { order: mut maker, .. } in crossing_counters(taker, resting) {
            if taker.remaining.is_zero() {
                break;
            }
            let qty = taker.remaining.min(maker.remaining);
            let trade = Trade {
                id: TradeId::new(),
                question_id: taker.question_id,
                taker_order_id: taker.id,
                taker_member_id: taker.member_id,
                maker_order_id: maker.id,
                maker_member_id: maker.member_id,
                price: taker.price,
                quantity: qty,
                taker_side: taker.side,
                taker_direction: taker.direction,
                executed_at: now,
            };

            taker.apply_fill(qty, now);
            maker.apply_fill(qty, now);

            let maker_price = if maker.side == taker.side {
                taker.price
            } else {
                Decimal::ONE - taker.price
            };
            self.settle_party(uow, taker, qty, taker.price, updates)?;
            self.settle_party(uow, &maker, qty, maker_price, updates)?;

            tracing::debug!(
                trade_id = %trade.id,
                taker = %trade.taker_order_id,
                maker = %trade.maker_order_id,
                price = %trade.price,
                qty = %trade.quantity,
                "Trade matched"
            );

            uow.put_order(maker);
            uow.record_trade(trade.clone());
            trades.push(trade);
        }
        Ok(trades)
    }

    /// Move funds and shares of one party of a fill.
    fn settle_party(
        &self,
        uow: &mut UnitOfWork<'_>,
        order: &Order,
        qty: Decimal,
        execution_price: Decimal,
        updates: &mut Vec<PositionUpdate>,
    ) -> Result<()> {
        let key = PositionKey::new(order.member_id, order.question_id, order.side);
        match order.direction {
            Direction::Buy => {
                uow.consume_frozen(order.member_id, qty * execution_price)?;
                let improvement = qty * (order.price - execution_price);
                if improvement > Decimal::ZERO {
                    uow.unfreeze(order.member_id, improvement)?;
                    uow.record_movement(
                        order.member_id,
                        LedgerKind::Refund,
                        improvement,
                        format!("Price improvement on order {}", order.id),
                        Some(order.question_id),
                    );
                }
                updates.push(self.positions.apply_fill(uow, key, qty, execution_price)?);
            }
            Direction::Sell => {
                updates.push(self.positions.release_on_sell(uow, key, qty)?);
                let proceeds = qty * execution_price;
                uow.credit(order.member_id, proceeds);
                uow.record_movement(
                    order.member_id,
                    LedgerKind::SellSettlement,
                    proceeds,
                    format!("SELL {} {qty} @ {execution_price}", order.side),
                    Some(order.question_id),
                );
            }
        }
        Ok(())
    }

    /// Cancel what is left of an order and release its reservation.
    /// Returns the refunded amount (zero for SELL orders).
    fn release_remainder(
        &self,
        uow: &mut UnitOfWork<'_>,
        order: &mut Order,
        now: DateTime<Utc>,
        updates: &mut Vec<PositionUpdate>,
    ) -> Result<Decimal> {
        let cancelled = order.cancel_remaining(now);
        match order.direction {
            Direction::Buy => {
                let refund = cancelled * order.price;
                if refund > Decimal::ZERO {
                    uow.unfreeze(order.member_id, refund)?;
                    uow.record_movement(
                        order.member_id,
                        LedgerKind::Refund,
                        refund,
                        format!("Refund of cancelled order {}", order.id),
                        Some(order.question_id),
                    );
                }
                Ok(refund)
            }
            Direction::Sell => {
                let key = PositionKey::new(order.member_id, order.question_id, order.side);
                updates.extend(self.positions.release_reservation(uow, key, cancelled));
                Ok(Decimal::ZERO)
            }
        }
    }

    fn after_submit(&self, request: &OrderRequest, committed: &Committed<SubmitOutcome>) {
        let outcome = &committed.value;
        tracing::info!(
            order_id = %outcome.order_id,
            member = %request.member_id,
            question = %request.question_id,
            status = %outcome.status,
            filled = %outcome.filled_quantity,
            trades = outcome.trades.len(),
            "Order accepted"
        );
        self.audit.log(
            Some(request.member_id),
            AuditAction::OrderCreate,
            "ORDER",
            Some(outcome.order_id.to_string()),
            &format!(
                "{} {} {} x{}: {}",
                request.kind, request.direction, request.side, request.quantity, outcome.message
            ),
        );
        self.log_position_updates(&committed.updates);
    }

    fn log_position_updates(&self, updates: &[PositionUpdate]) {
        for update in updates {
            self.audit.log(
                Some(update.key.member_id),
                AuditAction::PositionUpdate,
                "POSITION",
                Some(format!("{}:{}", update.key.question_id, update.key.side)),
                &update.detail,
            );
        }
    }

    // =================================================================
    // Cancellation
    // =================================================================

    /// Cancel an OPEN or PARTIAL order. Returns the refunded amount.
    ///
    /// # Errors
    /// `OrderNotFound`, `NotOrderOwner`, `OrderNotCancellable`.
    pub fn cancel(&self, order_id: OrderId, member_id: MemberId) -> Result<Decimal> {
        let order = self.store.order(order_id).ok_or(PredmatchError::OrderNotFound(order_id))?;
        let lock = self.store.question_lock(order.question_id);
        let committed = self
            .retry
            .run_locked(&lock, || self.try_cancel(order_id, member_id, Utc::now()))?;

        tracing::info!(%order_id, member = %member_id, refunded = %committed.value, "Order cancelled");
        self.audit.log(
            Some(member_id),
            AuditAction::OrderCancel,
            "ORDER",
            Some(order_id.to_string()),
            &format!("refunded {}", committed.value),
        );
        self.log_position_updates(&committed.updates);
        Ok(committed.value)
    }

    fn try_cancel(&self, order_id: OrderId, member_id: MemberId, now: DateTime<Utc>) -> Result<Committed<Decimal>> {
        let mut uow = self.store.begin();
        let mut order = uow.order(order_id).ok_or(PredmatchError::OrderNotFound(order_id))?;
        if order.member_id != member_id {
            return Err(PredmatchError::NotOrderOwner(order_id));
        }
        if !order.status.is_resting() {
            return Err(PredmatchError::OrderNotCancellable { status: order.status });
        }
        let mut updates = Vec::new();
        let refunded = self.release_remainder(&mut uow, &mut order, now, &mut updates)?;
        uow.put_order(order);
        uow.commit()?;
        Ok(Committed {
            value: refunded,
            updates,
        })
    }

    /// Cancel and wrap the result for the API.
    pub fn cancel_order(&self, order_id: OrderId, member_id: MemberId) -> CancelResponse {
        match self.cancel(order_id, member_id) {
            Ok(refunded_amount) => CancelResponse {
                success: true,
                message: "Order cancelled.".into(),
                refunded_amount,
            },
            Err(err) => CancelResponse {
                success: false,
                message: err.to_string(),
                refunded_amount: Decimal::ZERO,
            },
        }
    }

    /// Cancel every resting order of a question inside `uow`: BUY
    /// reservations are refunded, SELL reservations released. Used when a
    /// question stops trading for good.
    pub fn cancel_resting_in(
        &self,
        uow: &mut UnitOfWork<'_>,
        question_id: QuestionId,
        now: DateTime<Utc>,
    ) -> Result<(usize, Vec<PositionUpdate>)> {
        let mut updates = Vec::new();
        let resting = uow.resting_orders(question_id);
        let count = resting.len();
        for mut order in resting {
            self.release_remainder(uow, &mut order, now, &mut updates)?;
            uow.put_order(order);
        }
        Ok((count, updates))
    }

    /// Audit position changes committed outside the engine.
    pub fn audit_position_updates(&self, updates: &[PositionUpdate]) {
        self.log_position_updates(updates);
    }

    // =================================================================
    // Read side
    // =================================================================

    pub fn order_book(&self, question_id: QuestionId) -> Result<OrderBookSnapshot> {
        let book = OrderBook::load(&self.store, question_id)?;
        Ok(book.snapshot(self.store.last_trade(question_id).as_ref()))
    }

    pub fn price_info(&self, question_id: QuestionId) -> Result<PriceInfo> {
        let book = OrderBook::load(&self.store, question_id)?;
        Ok(book.price_info(self.store.last_trade(question_id).as_ref()))
    }

    /// Resting orders of a member on a question.
    #[must_use]
    pub fn open_orders(&self, member_id: MemberId, question_id: QuestionId) -> Vec<Order> {
        self.store
            .orders_for_member(member_id, Some(question_id))
            .into_iter()
            .filter(|o| o.status.is_resting())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use predmatch_ingress::MemoryAuditTrail;
    use predmatch_types::{Question, QuestionStatus};

    use super::*;

    struct Fixture {
        engine: MatchingEngine,
        audit: Arc<MemoryAuditTrail>,
        question: QuestionId,
    }

    fn dec(units: i64, scale: u32) -> Decimal {
        Decimal::new(units, scale)
    }

    fn fixture() -> Fixture {
        let store = Arc::new(Store::new());
        let audit = Arc::new(MemoryAuditTrail::new());
        let mut question = Question::new("Will it rain?", dec(500, 0), Utc::now() + Duration::hours(1));
        question.status = QuestionStatus::Betting;
        let id = question.id;
        let mut uow = store.begin();
        uow.put_question(question);
        uow.commit().unwrap();
        let engine = MatchingEngine::new(store, &EngineConfig::default(), Arc::new(PauseRegistry::new()), audit.clone());
        Fixture {
            engine,
            audit,
            question: id,
        }
    }

    impl Fixture {
        fn funded(&self, amount: i64) -> MemberId {
            let m = MemberId::new();
            self.engine.store().deposit(m, dec(amount, 0)).unwrap();
            m
        }

        fn limit(&self, m: MemberId, side: Side, direction: Direction, cents: i64, qty: i64) -> Result<SubmitOutcome> {
            self.engine.submit(&OrderRequest::limit(m, self.question, side, direction, dec(cents, 2), dec(qty, 0)))
        }
    }

    #[test]
    fn complementary_buys_mint_at_taker_price() {
        let fx = fixture();
        let maker = fx.funded(1000);
        let taker = fx.funded(1000);

        let rest = fx.limit(maker, Side::No, Direction::Buy, 45, 100).unwrap();
        assert_eq!(rest.message, "Order added to order book.");

        let out = fx.limit(taker, Side::Yes, Direction::Buy, 60, 100).unwrap();
        assert_eq!(out.status, OrderStatus::Filled);
        assert_eq!(out.trades.len(), 1);
        assert_eq!(out.trades[0].price, dec(60, 2));
        assert_eq!(out.message, "Order completely filled.");

        let store = fx.engine.store();
        // Taker paid 60; maker paid 1 - 0.60 = 0.40 per share and got 5 back.
        assert_eq!(store.balance(taker).available, dec(940, 0));
        assert_eq!(store.balance(maker).available, dec(960, 0));
        assert_eq!(store.balance(maker).frozen, Decimal::ZERO);

        let maker_pos = store.position(PositionKey::new(maker, fx.question, Side::No)).unwrap();
        assert_eq!(maker_pos.avg_price, dec(40, 2));

        let q = store.question(fx.question).unwrap();
        assert_eq!(q.pools.yes, dec(600, 0));
        assert_eq!(q.pools.total, dec(1100, 0));
        assert_eq!(store.price_history(fx.question).len(), 1);
    }

    #[test]
    fn non_crossing_orders_rest() {
        let fx = fixture();
        let a = fx.funded(1000);
        let b = fx.funded(1000);
        fx.limit(a, Side::No, Direction::Buy, 35, 10).unwrap();
        let out = fx.limit(b, Side::Yes, Direction::Buy, 60, 10).unwrap();
        assert!(out.trades.is_empty(), "0.35 < 1 - 0.60 must not cross");
        assert_eq!(fx.engine.store().resting_orders(fx.question).len(), 2);
    }

    #[test]
    fn price_time_priority() {
        let fx = fixture();
        let early = fx.funded(1000);
        let late = fx.funded(1000);
        let better = fx.funded(1000);
        let taker = fx.funded(1000);

        let e = fx.limit(early, Side::No, Direction::Buy, 45, 10).unwrap();
        fx.limit(late, Side::No, Direction::Buy, 45, 10).unwrap();
        let b = fx.limit(better, Side::No, Direction::Buy, 50, 10).unwrap();

        let out = fx.limit(taker, Side::Yes, Direction::Buy, 60, 15).unwrap();
        assert_eq!(out.trades[0].maker_order_id, b.order_id, "lowest effective ask first");
        assert_eq!(out.trades[1].maker_order_id, e.order_id, "then earliest arrival");
        assert_eq!(out.trades[1].quantity, dec(5, 0));
        assert_eq!(out.message, "Order completely filled.");
    }

    #[test]
    fn partial_fill_message_and_reservation() {
        let fx = fixture();
        let maker = fx.funded(1000);
        let taker = fx.funded(1000);
        fx.limit(maker, Side::No, Direction::Buy, 50, 30).unwrap();
        let out = fx.limit(taker, Side::Yes, Direction::Buy, 60, 100).unwrap();
        assert_eq!(out.status, OrderStatus::Partial);
        assert_eq!(out.message, "Partially filled. (30/100)");
        // 70 still resting at 0.60.
        assert_eq!(fx.engine.store().balance(taker).frozen, dec(42, 0));
    }

    #[test]
    fn self_trades_are_skipped() {
        let fx = fixture();
        let m = fx.funded(1000);
        fx.limit(m, Side::No, Direction::Buy, 50, 10).unwrap();
        let out = fx.limit(m, Side::Yes, Direction::Buy, 60, 10).unwrap();
        assert!(out.trades.is_empty());
    }

    #[test]
    fn sell_fills_against_bid_and_credits_proceeds() {
        let fx = fixture();
        let holder = fx.funded(1000);
        let minter = fx.funded(1000);
        let bidder = fx.funded(1000);

        fx.limit(minter, Side::No, Direction::Buy, 50, 40).unwrap();
        fx.limit(holder, Side::Yes, Direction::Buy, 50, 40).unwrap();
        fx.limit(bidder, Side::Yes, Direction::Buy, 55, 40).unwrap();

        let out = fx.limit(holder, Side::Yes, Direction::Sell, 52, 40).unwrap();
        assert_eq!(out.status, OrderStatus::Filled);
        assert_eq!(out.trades[0].price, dec(52, 2));

        let store = fx.engine.store();
        // 1000 - 20 + 40 × 0.52
        assert_eq!(store.balance(holder).available, dec(1000_80, 2));
        assert!(store.position(PositionKey::new(holder, fx.question, Side::Yes)).is_none());
        // Bidder reserved 22 at 0.55, paid 20.80, got 1.20 back.
        assert_eq!(store.balance(bidder).available, dec(979_20, 2));
        assert_eq!(store.balance(bidder).frozen, Decimal::ZERO);
    }

    #[test]
    fn sell_without_shares_is_rejected() {
        let fx = fixture();
        let m = fx.funded(100);
        let err = fx.limit(m, Side::Yes, Direction::Sell, 50, 10).unwrap_err();
        assert!(matches!(err, PredmatchError::InsufficientPosition { .. }), "Got: {err}");
    }

    #[test]
    fn insufficient_balance_is_rejected_without_side_effects() {
        let fx = fixture();
        let m = fx.funded(10);
        let err = fx.limit(m, Side::Yes, Direction::Buy, 50, 100).unwrap_err();
        assert!(matches!(err, PredmatchError::InsufficientBalance { .. }));
        assert_eq!(fx.engine.store().balance(m).available, dec(10, 0));
        assert!(fx.engine.store().resting_orders(fx.question).is_empty());
    }

    #[test]
    fn market_order_without_quotes_reserves_nothing() {
        let fx = fixture();
        let m = fx.funded(1000);
        let req = OrderRequest::market(m, fx.question, Side::Yes, Direction::Buy, dec(50, 0));
        let err = fx.engine.submit(&req).unwrap_err();
        assert!(matches!(err, PredmatchError::NoExecutableQuotes));
        assert_eq!(fx.engine.store().balance(m).frozen, Decimal::ZERO);
        assert_eq!(fx.engine.store().balance(m).available, dec(1000, 0));
    }

    #[test]
    fn market_order_is_immediate_or_cancel() {
        let fx = fixture();
        let maker = fx.funded(1000);
        let taker = fx.funded(1000);
        fx.limit(maker, Side::No, Direction::Buy, 40, 30).unwrap();

        let req = OrderRequest::market(taker, fx.question, Side::Yes, Direction::Buy, dec(50, 0));
        let out = fx.engine.submit(&req).unwrap();
        assert_eq!(out.filled_quantity, dec(30, 0));
        assert_eq!(out.status, OrderStatus::Cancelled);
        assert_eq!(out.remaining_quantity, Decimal::ZERO);
        assert!(out.message.starts_with("Market order partially filled. (30/50"));

        let bal = fx.engine.store().balance(taker);
        assert_eq!(bal.frozen, Decimal::ZERO);
        assert_eq!(bal.available, dec(982, 0));
    }

    #[test]
    fn cancel_refunds_remaining_times_price() {
        let fx = fixture();
        let m = fx.funded(1000);
        let out = fx.limit(m, Side::Yes, Direction::Buy, 37, 100).unwrap();
        let refunded = fx.engine.cancel(out.order_id, m).unwrap();
        assert_eq!(refunded, dec(37, 0));
        assert_eq!(fx.engine.store().balance(m).available, dec(1000, 0));

        let again = fx.engine.cancel(out.order_id, m).unwrap_err();
        assert!(matches!(again, PredmatchError::OrderNotCancellable { .. }));
        assert_eq!(fx.audit.count(AuditAction::OrderCancel), 1);
    }

    #[test]
    fn only_the_owner_may_cancel() {
        let fx = fixture();
        let m = fx.funded(1000);
        let out = fx.limit(m, Side::Yes, Direction::Buy, 37, 10).unwrap();
        let resp = fx.engine.cancel_order(out.order_id, MemberId::new());
        assert!(!resp.success);
        assert!(resp.message.starts_with("PM_ERR_103"));
    }

    #[test]
    fn paused_and_closed_markets_reject_and_audit() {
        let fx = fixture();
        let m = fx.funded(1000);
        fx.engine.pause_registry().pause(fx.question);
        let err = fx.limit(m, Side::Yes, Direction::Buy, 50, 1).unwrap_err();
        assert!(matches!(err, PredmatchError::MarketPaused));
        assert_eq!(fx.audit.count(AuditAction::OrderReject), 1);
        fx.engine.pause_registry().resume(fx.question);

        let req = OrderRequest::limit(m, fx.question, Side::Yes, Direction::Buy, dec(50, 2), Decimal::ONE);
        let err = fx.engine.submit_at(&req, Utc::now() + Duration::hours(2)).unwrap_err();
        assert!(matches!(err, PredmatchError::MarketExpired));
    }

    #[test]
    fn netting_guard_blocks_two_sided_exposure() {
        let fx = fixture();
        let m = fx.funded(1000);
        let other = fx.funded(1000);
        fx.limit(other, Side::Yes, Direction::Buy, 50, 20).unwrap();
        fx.limit(m, Side::No, Direction::Buy, 50, 20).unwrap();
        fx.limit(m, Side::No, Direction::Sell, 90, 20).unwrap();

        let err = fx.limit(m, Side::Yes, Direction::Buy, 10, 5).unwrap_err();
        assert!(matches!(err, PredmatchError::NettingViolation { .. }), "Got: {err}");
    }

    #[test]
    fn risk_rejection_surfaces_reason() {
        let fx = fixture();
        let m = fx.funded(10_000);
        let resp = fx.engine.create_order(&OrderRequest::limit(
            m,
            fx.question,
            Side::Yes,
            Direction::Buy,
            dec(90, 2),
            dec(600, 0),
        ));
        assert!(!resp.success);
        assert!(resp.message.starts_with("Order value limit exceeded"), "Got: {}", resp.message);
        assert_eq!(fx.audit.count(AuditAction::RiskReject), 1);
        assert_eq!(fx.audit.count(AuditAction::OrderReject), 0);
    }

    #[test]
    fn book_and_price_info_reflect_resting_orders() {
        let fx = fixture();
        let a = fx.funded(1000);
        let b = fx.funded(1000);
        fx.limit(a, Side::Yes, Direction::Buy, 45, 10).unwrap();
        fx.limit(b, Side::No, Direction::Buy, 45, 10).unwrap();
        let book = fx.engine.order_book(fx.question).unwrap();
        assert_eq!(book.bids[0].price, dec(45, 2));
        assert_eq!(book.asks[0].price, dec(55, 2));
        let info = fx.engine.price_info(fx.question).unwrap();
        assert_eq!(info.mid_price, Some(dec(50, 2)));
        assert_eq!(info.spread, Some(dec(10, 2)));
    }

    #[test]
    fn responses_serialize_for_the_api() {
        let fx = fixture();
        let m = fx.funded(100);
        let resp = fx.engine.create_order(&OrderRequest::limit(
            m,
            fx.question,
            Side::Yes,
            Direction::Buy,
            dec(25, 2),
            dec(4, 0),
        ));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Order added to order book.");
        assert_eq!(json["remaining_qty"], "4");
    }

    #[test]
    fn effective_prices() {
        let no_bid = Order::dummy_limit(Side::No, Direction::Buy, dec(40, 2), Decimal::ONE);
        let yes_ask = Order::dummy_limit(Side::Yes, Direction::Sell, dec(52, 2), Decimal::ONE);
        let no_ask = Order::dummy_limit(Side::No, Direction::Sell, dec(52, 2), Decimal::ONE);
        assert_eq!(effective_price(Side::Yes, Direction::Buy, &no_bid), Some(dec(60, 2)));
        assert_eq!(effective_price(Side::Yes, Direction::Buy, &yes_ask), Some(dec(52, 2)));
        assert_eq!(effective_price(Side::Yes, Direction::Buy, &no_ask), None);
        assert_eq!(effective_price(Side::Yes, Direction::Sell, &yes_ask), None, "SELL never meets SELL");
    }
}
