//! Risk guard — hard gate for order entry.
//!
//! Runs before any funds or shares are reserved. Three independent checks:
//!
//! 1. **Position limit**: existing YES + NO quantity plus the candidate
//!    quantity must stay within `max_position_per_market`. BUY orders only;
//!    the market-maker account is exempt.
//! 2. **Order value**: `quantity × price ≤ max_order_value`. BUY orders only.
//! 3. **Circuit breaker**: trades on the question in the trailing window
//!    must stay below the threshold. Every order.
//!
//! ## Design Principles
//!
//! - **Fail-closed**: the first failing check rejects the order
//! - **Audited**: every rejection is written to the audit trail as
//!   `RISK_REJECT` before the caller sees it

use std::sync::Arc;

use chrono::{DateTime, Utc};
use predmatch_types::{
    AuditAction, Direction, MemberId, OrderRequest, RiskDecision, RiskLimits, RiskRejectionReason,
};
use rust_decimal::Decimal;

use crate::{AuditTrail, CircuitBreaker};

/// Pre-trade risk gate.
pub struct RiskGuard {
    limits: RiskLimits,
    market_maker: MemberId,
    breaker: CircuitBreaker,
    audit: Arc<dyn AuditTrail>,
}

impl std::fmt::Debug for RiskGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskGuard")
            .field("limits", &self.limits)
            .field("market_maker", &self.market_maker)
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}

impl RiskGuard {
    #[must_use]
    pub fn new(limits: RiskLimits, market_maker: MemberId, audit: Arc<dyn AuditTrail>) -> Self {
        let breaker = CircuitBreaker::new(limits.circuit_breaker.clone());
        Self {
            limits,
            market_maker,
            breaker,
            audit,
        }
    }

    #[must_use]
    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// The trade-rate breaker; fed with committed trades.
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run all checks for an order about to be accepted at `price`.
    ///
    /// `existing_exposure` is the member's current YES + NO quantity on the
    /// question. A rejection is audit-logged here.
    pub fn evaluate(
        &self,
        request: &OrderRequest,
        price: Decimal,
        existing_exposure: Decimal,
        now: DateTime<Utc>,
    ) -> RiskDecision {
        let decision = self.first_rejection(request, price, existing_exposure, now);
        if let RiskDecision::Rejected { reason } = &decision {
            tracing::warn!(
                member = %request.member_id,
                question = %request.question_id,
                %reason,
                "Order rejected by risk guard"
            );
            self.audit.log(
                Some(request.member_id),
                AuditAction::RiskReject,
                "ORDER",
                None,
                &format!(
                    "{} {} {} x{} @ {}: {reason}",
                    request.kind, request.direction, request.side, request.quantity, price
                ),
            );
        }
        decision
    }

    fn first_rejection(
        &self,
        request: &OrderRequest,
        price: Decimal,
        existing_exposure: Decimal,
        now: DateTime<Utc>,
    ) -> RiskDecision {
        if request.direction == Direction::Buy {
            let decision = self.check_position_limit(request.member_id, existing_exposure, request.quantity);
            if !decision.is_approved() {
                return decision;
            }
            let decision = self.check_order_value(request.quantity, price);
            if !decision.is_approved() {
                return decision;
            }
        }
        self.breaker.check(request.question_id, now)
    }

    /// Position-size cap. The market maker is exempt.
    #[must_use]
    pub fn check_position_limit(&self, member_id: MemberId, existing: Decimal, requested: Decimal) -> RiskDecision {
        if member_id == self.market_maker {
            return RiskDecision::Approved;
        }
        if existing + requested > self.limits.max_position_per_market {
            return RiskDecision::Rejected {
                reason: RiskRejectionReason::PositionLimitExceeded {
                    current: existing,
                    requested,
                    limit: self.limits.max_position_per_market,
                },
            };
        }
        RiskDecision::Approved
    }

    /// Order-value cap.
    #[must_use]
    pub fn check_order_value(&self, quantity: Decimal, price: Decimal) -> RiskDecision {
        let value = quantity * price;
        if value > self.limits.max_order_value {
            return RiskDecision::Rejected {
                reason: RiskRejectionReason::OrderValueExceeded {
                    value,
                    limit: self.limits.max_order_value,
                },
            };
        }
        RiskDecision::Approved
    }
}
