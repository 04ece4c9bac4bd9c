//! # predmatch-ingress
//!
//! **Order ingress gates**: everything an order passes before the matching
//! engine reserves funds or shares for it.
//!
//! ## Architecture
//!
//! 1. **PauseRegistry**: operator switches, global and per question
//! 2. **RiskGuard**: position limit, order value, trade-rate breaker
//! 3. **CircuitBreaker**: sliding window of committed trades per question
//! 4. **AuditTrail**: best-effort sink for business events
//!
//! ## Order Flow
//!
//! ```text
//! request → PauseRegistry.ensure_open() → RiskGuard.evaluate()
//!         → reserve funds / shares → match → commit
//!         → CircuitBreaker.record_trades() → AuditTrail.log()
//! ```
//!
//! Pause flags and breaker windows are in-memory and reset on restart.

pub mod audit_trail;
pub mod circuit_breaker;
pub mod pause;
pub mod risk_guard;

pub use audit_trail::{AuditTrail, MemoryAuditTrail, TracingAuditTrail};
pub use circuit_breaker::CircuitBreaker;
pub use pause::PauseRegistry;
pub use risk_guard::RiskGuard;
