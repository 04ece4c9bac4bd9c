//! # predmatch-persistence
//!
//! The store of truth for PredMatch: questions, orders, positions,
//! balances and payout records as versioned rows, plus the append-only
//! trade, ledger and price-history streams.
//!
//! All writes go through a [`UnitOfWork`]:
//!
//! 1. **Stage**: read rows (staged first, then committed), mutate, stage
//! 2. **Commit**: under the write lock, compare each staged row's version
//!    with the stored one; on any mismatch nothing is applied
//! 3. **Retry**: [`RetryPolicy`] re-runs the whole unit of work on
//!    `ConcurrencyConflict` with linear backoff
//!
//! A per-question mutex ([`Store::question_lock`], taken per attempt by
//! [`RetryPolicy::run_locked`]) serializes matching and
//! settlement of one question.

pub mod balances;
pub mod retry;
pub mod store;
pub mod unit_of_work;

pub use retry::{RetryPolicy, retry_with_backoff};
pub use store::Store;
pub use unit_of_work::UnitOfWork;
