//! The store of truth.
//!
//! ```text
//!   readers ──▶ RwLock<Tables>::read ──▶ cloned snapshots
//!   writers ──▶ UnitOfWork (staged rows) ──commit──▶ RwLock<Tables>::write
//!                                                   ├─ version check (all rows)
//!                                                   └─ apply (all or nothing)
//! ```
//!
//! Every versioned row carries the version it was read at. A commit only
//! applies when each staged row's version still equals the stored one;
//! the stored version is then bumped. Append-only streams (trades, ledger,
//! price history) are extended in the same critical section.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use predmatch_types::{
    BalanceEntry, LedgerEntry, MemberId, Order, OrderId, PayoutKey, PayoutRecord, Position,
    PositionKey, PricePoint, Question, QuestionId, Trade,
};

use crate::UnitOfWork;

/// Rows guarded by an optimistic version number.
pub(crate) trait Versioned: Clone {
    /// Entity name reported in conflict errors.
    const ENTITY: &'static str;

    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);
}

macro_rules! versioned {
    ($ty:ty, $entity:literal) => {
        impl Versioned for $ty {
            const ENTITY: &'static str = $entity;

            fn version(&self) -> u64 {
                self.version
            }

            fn set_version(&mut self, version: u64) {
                self.version = version;
            }
        }
    };
}

versioned!(Question, "question");
versioned!(Order, "order");
versioned!(Position, "position");
versioned!(BalanceEntry, "balance");
versioned!(PayoutRecord, "payout");

/// Committed state.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) questions: HashMap<QuestionId, Question>,
    pub(crate) orders: HashMap<OrderId, Order>,
    pub(crate) positions: HashMap<PositionKey, Position>,
    pub(crate) balances: HashMap<MemberId, BalanceEntry>,
    pub(crate) payouts: HashMap<PayoutKey, PayoutRecord>,
    pub(crate) trades: Vec<Trade>,
    pub(crate) ledger: Vec<LedgerEntry>,
    pub(crate) price_history: Vec<PricePoint>,
}

/// Thread-safe store shared by every engine component.
///
/// State lives in memory and is lost on restart, together with the
/// per-question locks and the arrival sequence.
#[derive(Debug, Default)]
pub struct Store {
    tables: RwLock<Tables>,
    sequence: AtomicU64,
    question_locks: Mutex<HashMap<QuestionId, Arc<Mutex<()>>>>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a unit of work against this store.
    #[must_use]
    pub fn begin(&self) -> UnitOfWork<'_> {
        UnitOfWork::new(self)
    }

    /// Next arrival sequence number (starts at 1).
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The exclusive lock serializing matching and settlement of one
    /// question. Other questions proceed concurrently.
    pub fn question_lock(&self, question_id: QuestionId) -> Arc<Mutex<()>> {
        let mut locks = self
            .question_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(question_id).or_default())
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    // =================================================================
    // Queries (committed state only)
    // =================================================================

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<Question> {
        self.read().questions.get(&id).cloned()
    }

    #[must_use]
    pub fn questions(&self) -> Vec<Question> {
        let mut all: Vec<Question> = self.read().questions.values().cloned().collect();
        all.sort_by_key(|q| q.created_at);
        all
    }

    #[must_use]
    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.read().orders.get(&id).cloned()
    }

    /// OPEN and PARTIAL orders of a question, oldest first.
    #[must_use]
    pub fn resting_orders(&self, question_id: QuestionId) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .read()
            .orders
            .values()
            .filter(|o| o.question_id == question_id && o.status.is_resting())
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.sequence);
        orders
    }

    /// Every order of a member, optionally restricted to one question.
    #[must_use]
    pub fn orders_for_member(&self, member_id: MemberId, question_id: Option<QuestionId>) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .read()
            .orders
            .values()
            .filter(|o| o.member_id == member_id && question_id.is_none_or(|q| o.question_id == q))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.sequence);
        orders
    }

    /// Trades of a question in execution order.
    #[must_use]
    pub fn trades(&self, question_id: QuestionId) -> Vec<Trade> {
        self.read()
            .trades
            .iter()
            .filter(|t| t.question_id == question_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn last_trade(&self, question_id: QuestionId) -> Option<Trade> {
        self.read()
            .trades
            .iter()
            .rev()
            .find(|t| t.question_id == question_id)
            .cloned()
    }

    #[must_use]
    pub fn position(&self, key: PositionKey) -> Option<Position> {
        self.read().positions.get(&key).cloned()
    }

    #[must_use]
    pub fn positions_for_question(&self, question_id: QuestionId) -> Vec<Position> {
        self.read()
            .positions
            .values()
            .filter(|p| p.question_id == question_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn positions_for_member(&self, member_id: MemberId) -> Vec<Position> {
        self.read()
            .positions
            .values()
            .filter(|p| p.member_id == member_id)
            .cloned()
            .collect()
    }

    /// Balance of a member; zero if the member never held funds.
    #[must_use]
    pub fn balance(&self, member_id: MemberId) -> BalanceEntry {
        self.read()
            .balances
            .get(&member_id)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn ledger_for_member(&self, member_id: MemberId) -> Vec<LedgerEntry> {
        self.read()
            .ledger
            .iter()
            .filter(|e| e.member_id == member_id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn payout(&self, key: &PayoutKey) -> Option<PayoutRecord> {
        self.read().payouts.get(key).cloned()
    }

    #[must_use]
    pub fn payouts_for_question(&self, question_id: QuestionId) -> Vec<PayoutRecord> {
        let mut records: Vec<PayoutRecord> = self
            .read()
            .payouts
            .values()
            .filter(|p| p.question_id == question_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }

    #[must_use]
    pub fn price_history(&self, question_id: QuestionId) -> Vec<PricePoint> {
        self.read()
            .price_history
            .iter()
            .filter(|p| p.question_id == question_id)
            .cloned()
            .collect()
    }
}
