//! # predmatch-types
//!
//! Shared types, errors, and configuration for the **PredMatch** prediction
//! market core.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`MemberId`], [`QuestionId`], [`TradeId`]
//! - **Order model**: [`Order`], [`Side`], [`Direction`], [`OrderKind`], [`OrderStatus`]
//! - **Trade model**: [`Trade`], [`PricePoint`]
//! - **Position model**: [`Position`], [`PositionKey`], [`PositionPnl`]
//! - **Question model**: [`Question`], [`QuestionStatus`], [`FinalResult`], [`Pools`]
//! - **Balances and ledger**: [`BalanceEntry`], [`LedgerEntry`], [`LedgerKind`]
//! - **Audit trail**: [`AuditEntry`], [`AuditAction`]
//! - **Payouts**: [`PayoutRecord`], [`PayoutKey`], [`PayoutStatus`]
//! - **Risk management**: [`RiskLimits`], [`RiskDecision`], [`RiskRejectionReason`]
//! - **Configuration**: [`EngineConfig`] and its sections
//! - **Errors**: [`PredmatchError`] with `PM_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod audit;
pub mod balance;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod order;
pub mod payout;
pub mod position;
pub mod question;
pub mod risk;
pub mod trade;

// Re-export all primary types at crate root for ergonomic imports:
//   use predmatch_types::{Order, Side, Trade, Position, ...};

pub use audit::*;
pub use balance::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use order::*;
pub use payout::*;
pub use position::*;
pub use question::*;
pub use risk::*;
pub use trade::*;

// Constants are accessed via `predmatch_types::constants::FOO`
// (not re-exported to avoid name collisions).
