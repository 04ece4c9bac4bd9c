//! # predmatch-settlement
//!
//! **Resolution plane**: two-phase settlement of binary questions.
//!
//! ## Architecture
//!
//! Settlement reads positions and pool totals, never the live book:
//! 1. Initiate: record a tentative result and open the dispute window
//! 2. Finalize: commit the result, settle positions, plan one payout per
//!    winner, all in one unit of work
//! 3. Distribute: credit each payout in its own unit of work, keyed
//!    `question:member`, with a bounded retry budget
//! 4. Mirror: publish the result on chain, best-effort, after commit
//!
//! ## Payout Formula
//!
//! The house subsidy is excluded from both pools; see
//! [`calculator`] for the exact arithmetic.

pub mod calculator;
pub mod chain_mirror;
pub mod engine;
pub mod payout;

pub use calculator::{PoolSnapshot, SettlementCalculator};
pub use chain_mirror::{ChainMirror, MemoryChainMirror, MirrorDispatcher, MirrorFuture, SettlementEvent};
pub use engine::{SettlementEngine, SettlementHistoryItem, SettlementSummary, TentativeSummary};
pub use payout::{DistributionReport, PayoutDistributor};
