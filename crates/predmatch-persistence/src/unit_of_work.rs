//! Units of work: staged writes committed atomically.
//!
//! Reads through a [`UnitOfWork`] see its own staged rows first, then the
//! committed state. Nothing is visible to other readers until
//! [`UnitOfWork::commit`] succeeds; a dropped unit of work discards its
//! staged writes.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use predmatch_types::{
    BalanceEntry, LedgerEntry, MemberId, Order, OrderId, PayoutKey, PayoutRecord, Position,
    PositionKey, PredmatchError, PricePoint, Question, QuestionId, Result, Trade,
};

use crate::Store;
use crate::store::Versioned;

/// A staged row. `row == None` stages a delete.
#[derive(Debug, Clone)]
struct Pending<V> {
    /// Version the row was read at (0 = expected absent).
    base: u64,
    row: Option<V>,
}

/// Staged writes of one table.
#[derive(Debug)]
struct Staged<K, V> {
    rows: HashMap<K, Pending<V>>,
}

impl<K, V> Default for Staged<K, V> {
    fn default() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }
}

impl<K, V> Staged<K, V>
where
    K: Hash + Eq + Clone + Debug,
    V: Versioned,
{
    fn get(&self, key: &K, committed: &HashMap<K, V>) -> Option<V> {
        match self.rows.get(key) {
            Some(pending) => pending.row.clone(),
            None => committed.get(key).cloned(),
        }
    }

    fn put(&mut self, key: K, row: V) {
        // The first staging of a key fixes the base version.
        let base = self.rows.get(&key).map_or(row.version(), |p| p.base);
        self.rows.insert(key, Pending {
            base,
            row: Some(row),
        });
    }

    fn delete(&mut self, key: K, version: u64) {
        let base = self.rows.get(&key).map_or(version, |p| p.base);
        self.rows.insert(key, Pending { base, row: None });
    }

    /// Committed rows matching `filter`, overlaid with staged rows.
    fn merged(&self, committed: &HashMap<K, V>, filter: impl Fn(&V) -> bool) -> Vec<V> {
        let mut out: Vec<V> = committed
            .iter()
            .filter(|(k, _)| !self.rows.contains_key(*k))
            .map(|(_, v)| v)
            .filter(|v| filter(v))
            .cloned()
            .collect();
        out.extend(
            self.rows
                .values()
                .filter_map(|p| p.row.as_ref())
                .filter(|v| filter(v))
                .cloned(),
        );
        out
    }

    fn check(&self, committed: &HashMap<K, V>) -> Result<()> {
        for (key, pending) in &self.rows {
            let current = committed.get(key).map_or(0, Versioned::version);
            if current != pending.base {
                return Err(PredmatchError::ConcurrencyConflict {
                    entity: V::ENTITY,
                    id: format!("{key:?}"),
                });
            }
        }
        Ok(())
    }

    fn apply(self, committed: &mut HashMap<K, V>) {
        for (key, pending) in self.rows {
            match pending.row {
                Some(mut row) => {
                    row.set_version(pending.base + 1);
                    committed.insert(key, row);
                }
                None => {
                    committed.remove(&key);
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Staged writes against a [`Store`].
///
/// Balance and ledger operations exist only on this handle, so every
/// movement of funds is part of some unit of work.
#[derive(Debug)]
pub struct UnitOfWork<'a> {
    store: &'a Store,
    questions: Staged<QuestionId, Question>,
    orders: Staged<OrderId, Order>,
    positions: Staged<PositionKey, Position>,
    balances: Staged<MemberId, BalanceEntry>,
    payouts: Staged<PayoutKey, PayoutRecord>,
    trades: Vec<Trade>,
    ledger: Vec<LedgerEntry>,
    price_points: Vec<PricePoint>,
}

impl<'a> UnitOfWork<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            questions: Staged::default(),
            orders: Staged::default(),
            positions: Staged::default(),
            balances: Staged::default(),
            payouts: Staged::default(),
            trades: Vec::new(),
            ledger: Vec::new(),
            price_points: Vec::new(),
        }
    }

    /// The store this unit of work commits to.
    #[must_use]
    pub fn store(&self) -> &'a Store {
        self.store
    }

    // =================================================================
    // Questions
    // =================================================================

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<Question> {
        self.questions.get(&id, &self.store.read().questions)
    }

    /// Load a question or fail with `QuestionNotFound`.
    pub fn require_question(&self, id: QuestionId) -> Result<Question> {
        self.question(id).ok_or(PredmatchError::QuestionNotFound(id))
    }

    pub fn put_question(&mut self, question: Question) {
        self.questions.put(question.id, question);
    }

    // =================================================================
    // Orders
    // =================================================================

    #[must_use]
    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.orders.get(&id, &self.store.read().orders)
    }

    pub fn put_order(&mut self, order: Order) {
        self.orders.put(order.id, order);
    }

    /// OPEN and PARTIAL orders of a question, including staged ones,
    /// ordered by arrival sequence.
    #[must_use]
    pub fn resting_orders(&self, question_id: QuestionId) -> Vec<Order> {
        let mut orders = self.orders.merged(&self.store.read().orders, |o| {
            o.question_id == question_id && o.status.is_resting()
        });
        orders.sort_by_key(|o| o.sequence);
        orders
    }

    // =================================================================
    // Positions
    // =================================================================

    #[must_use]
    pub fn position(&self, key: PositionKey) -> Option<Position> {
        self.positions.get(&key, &self.store.read().positions)
    }

    pub fn put_position(&mut self, position: Position) {
        self.positions.put(position.key(), position);
    }

    /// Remove a position row read at `version`.
    pub fn delete_position(&mut self, key: PositionKey, version: u64) {
        self.positions.delete(key, version);
    }

    #[must_use]
    pub fn positions_for_question(&self, question_id: QuestionId) -> Vec<Position> {
        self.positions
            .merged(&self.store.read().positions, |p| p.question_id == question_id)
    }

    // =================================================================
    // Balances (raw rows; operations live in `balances.rs`)
    // =================================================================

    /// Balance of a member as seen by this unit of work.
    #[must_use]
    pub fn balance(&self, member_id: MemberId) -> BalanceEntry {
        self.balances
            .get(&member_id, &self.store.read().balances)
            .unwrap_or_default()
    }

    pub(crate) fn put_balance(&mut self, member_id: MemberId, entry: BalanceEntry) {
        self.balances.put(member_id, entry);
    }

    // =================================================================
    // Payout records
    // =================================================================

    #[must_use]
    pub fn payout(&self, key: &PayoutKey) -> Option<PayoutRecord> {
        self.payouts.get(key, &self.store.read().payouts)
    }

    pub fn put_payout(&mut self, record: PayoutRecord) {
        self.payouts.put(record.key.clone(), record);
    }

    // =================================================================
    // Append-only streams
    // =================================================================

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    /// Trades staged so far in this unit of work.
    #[must_use]
    pub fn staged_trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn record_price_point(&mut self, point: PricePoint) {
        self.price_points.push(point);
    }

    /// Append a ledger entry. The unit of work is the only way in.
    pub fn record_ledger(&mut self, entry: LedgerEntry) {
        self.ledger.push(entry);
    }

    // =================================================================
    // Commit
    // =================================================================

    /// Validate every staged row's version and apply all writes.
    ///
    /// # Errors
    /// `ConcurrencyConflict` if any row changed since it was read. In
    /// that case nothing is applied.
    pub fn commit(self) -> Result<()> {
        let mut tables = self.store.write();

        self.questions.check(&tables.questions)?;
        self.orders.check(&tables.orders)?;
        self.positions.check(&tables.positions)?;
        self.balances.check(&tables.balances)?;
        self.payouts.check(&tables.payouts)?;

        tracing::trace!(
            questions = self.questions.len(),
            orders = self.orders.len(),
            positions = self.positions.len(),
            balances = self.balances.len(),
            payouts = self.payouts.len(),
            trades = self.trades.len(),
            ledger = self.ledger.len(),
            "Committing unit of work"
        );

        self.questions.apply(&mut tables.questions);
        self.orders.apply(&mut tables.orders);
        self.positions.apply(&mut tables.positions);
        self.balances.apply(&mut tables.balances);
        self.payouts.apply(&mut tables.payouts);
        tables.trades.extend(self.trades);
        tables.ledger.extend(self.ledger);
        tables.price_history.extend(self.price_points);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use predmatch_types::{QuestionStatus, Side};
    use rust_decimal::Decimal;

    use super::*;

    fn seeded_question(store: &Store) -> QuestionId {
        let q = Question::new("Q", Decimal::new(500, 0), Utc::now() + Duration::hours(1));
        let id = q.id;
        let mut uow = store.begin();
        uow.put_question(q);
        uow.commit().unwrap();
        id
    }

    #[test]
    fn staged_rows_are_private_until_commit() {
        let store = Store::new();
        let q = seeded_question(&store);

        let mut uow = store.begin();
        let mut question = uow.require_question(q).unwrap();
        question.status = QuestionStatus::Betting;
        uow.put_question(question);

        assert_eq!(uow.question(q).unwrap().status, QuestionStatus::Betting);
        assert_eq!(store.question(q).unwrap().status, QuestionStatus::Voting);

        uow.commit().unwrap();
        let stored = store.question(q).unwrap();
        assert_eq!(stored.status, QuestionStatus::Betting);
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn dropped_unit_of_work_discards_writes() {
        let store = Store::new();
        let q = seeded_question(&store);
        {
            let mut uow = store.begin();
            let mut question = uow.require_question(q).unwrap();
            question.pools.add(Side::Yes, Decimal::new(10, 0));
            uow.put_question(question);
        }
        assert_eq!(store.question(q).unwrap().pools.yes, Decimal::new(500, 0));
    }

    #[test]
    fn stale_version_conflicts_and_applies_nothing() {
        let store = Store::new();
        let q = seeded_question(&store);

        let mut first = store.begin();
        let mut second = store.begin();

        let mut a = first.require_question(q).unwrap();
        let mut b = second.require_question(q).unwrap();
        a.title = "first".into();
        b.title = "second".into();
        first.put_question(a);
        second.put_question(b);

        let member = MemberId::new();
        second.deposit(member, Decimal::new(100, 0));

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(err.is_conflict(), "Got: {err}");

        assert_eq!(store.question(q).unwrap().title, "first");
        assert!(store.balance(member).is_zero(), "conflicting commit must not apply any row");
    }

    #[test]
    fn inserting_an_existing_row_as_new_conflicts() {
        let store = Store::new();
        let key = PositionKey::new(MemberId::new(), QuestionId::new(), Side::Yes);

        let mut first = store.begin();
        first.put_position(Position::empty(key));
        let mut second = store.begin();
        second.put_position(Position::empty(key));

        first.commit().unwrap();
        assert!(second.commit().unwrap_err().is_conflict());
    }

    #[test]
    fn delete_then_recreate_keeps_base_version() {
        let store = Store::new();
        let key = PositionKey::new(MemberId::new(), QuestionId::new(), Side::No);
        let mut uow = store.begin();
        let mut pos = Position::empty(key);
        pos.quantity = Decimal::new(5, 0);
        uow.put_position(pos);
        uow.commit().unwrap();

        let mut uow = store.begin();
        let existing = uow.position(key).unwrap();
        uow.delete_position(key, existing.version);
        assert!(uow.position(key).is_none());
        let mut fresh = Position::empty(key);
        fresh.quantity = Decimal::new(2, 0);
        uow.put_position(fresh);
        uow.commit().unwrap();

        let stored = store.position(key).unwrap();
        assert_eq!(stored.quantity, Decimal::new(2, 0));
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn resting_orders_merge_staged_rows() {
        let store = Store::new();
        let q = seeded_question(&store);
        let mut order = predmatch_types::Order::dummy_limit(
            Side::Yes,
            predmatch_types::Direction::Buy,
            Decimal::new(50, 2),
            Decimal::new(10, 0),
        );
        order.question_id = q;
        let mut uow = store.begin();
        uow.put_order(order.clone());
        assert_eq!(uow.resting_orders(q).len(), 1);
        assert!(store.resting_orders(q).is_empty());

        order.cancel_remaining(Utc::now());
        uow.put_order(order);
        assert!(uow.resting_orders(q).is_empty());
    }
}
