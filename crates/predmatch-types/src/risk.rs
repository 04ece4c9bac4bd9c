//! Risk management types.
//!
//! Every order passes three independent checks before any funds or shares
//! are reserved:
//!
//! ```text
//! Order arrives
//!   → position limit   (existing YES + NO + requested ≤ cap, market maker exempt)
//!   → order value      (quantity × price ≤ cap)
//!   → circuit breaker  (trades in trailing window < threshold)
//!   → IF ANY FAIL → audit RISK_REJECT, reject with reason
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants;

/// Sliding-window trade-rate breaker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Trades inside the window at which new orders are refused.
    pub trade_count_threshold: usize,
    /// Length of the trailing window.
    pub window_secs: u64,
    /// Hint reported to callers; the breaker itself has no cooldown state.
    pub cooldown_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            trade_count_threshold: constants::DEFAULT_CIRCUIT_BREAKER_TRADES,
            window_secs: constants::DEFAULT_CIRCUIT_BREAKER_WINDOW_SECS,
            cooldown_secs: constants::DEFAULT_CIRCUIT_BREAKER_COOLDOWN_SECS,
        }
    }
}

/// Pre-trade limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Maximum YES + NO shares per member per question.
    pub max_position_per_market: Decimal,
    /// Maximum `quantity × price` of a single BUY order.
    pub max_order_value: Decimal,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_per_market: Decimal::from(constants::DEFAULT_MAX_POSITION_PER_MARKET),
            max_order_value: Decimal::from(constants::DEFAULT_MAX_ORDER_VALUE),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// The result of a single risk check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskDecision {
    Approved,
    Rejected { reason: RiskRejectionReason },
}

impl RiskDecision {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Human-readable reason, if rejected.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Approved => None,
            Self::Rejected { reason } => Some(reason.to_string()),
        }
    }
}

/// Why the risk guard refused an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskRejectionReason {
    PositionLimitExceeded {
        current: Decimal,
        requested: Decimal,
        limit: Decimal,
    },
    OrderValueExceeded {
        value: Decimal,
        limit: Decimal,
    },
    CircuitBreakerTripped {
        trades: usize,
        window_secs: u64,
        resume_in_secs: u64,
    },
}

impl std::fmt::Display for RiskRejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PositionLimitExceeded {
                current,
                requested,
                limit,
            } => write!(
                f,
                "Position limit exceeded: holding {current} + {requested} would exceed {limit} per market"
            ),
            Self::OrderValueExceeded { value, limit } => {
                write!(f, "Order value limit exceeded: {value} > {limit}")
            }
            Self::CircuitBreakerTripped {
                trades,
                window_secs,
                resume_in_secs,
            } => write!(
                f,
                "Temporarily suspended due to high trading volume ({trades} trades in {window_secs}s, will resume in {resume_in_secs} seconds)"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_house_limits() {
        let limits = RiskLimits::default();
        assert_eq!(limits.max_position_per_market, Decimal::new(1000, 0));
        assert_eq!(limits.max_order_value, Decimal::new(500, 0));
        assert_eq!(limits.circuit_breaker.trade_count_threshold, 100);
        assert_eq!(limits.circuit_breaker.window_secs, 60);
        assert_eq!(limits.circuit_breaker.cooldown_secs, 30);
    }

    #[test]
    fn rejection_messages() {
        let d = RiskDecision::Rejected {
            reason: RiskRejectionReason::OrderValueExceeded {
                value: Decimal::new(600, 0),
                limit: Decimal::new(500, 0),
            },
        };
        assert!(!d.is_approved());
        let msg = d.reason().unwrap();
        assert!(msg.starts_with("Order value limit exceeded"), "Got: {msg}");

        let breaker = RiskRejectionReason::CircuitBreakerTripped {
            trades: 5,
            window_secs: 60,
            resume_in_secs: 30,
        };
        assert!(breaker.to_string().contains("will resume in 30 seconds"));
        assert!(RiskDecision::Approved.reason().is_none());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let limits: RiskLimits = serde_json::from_str(r#"{"max_order_value":"250"}"#).unwrap();
        assert_eq!(limits.max_order_value, Decimal::new(250, 0));
        assert_eq!(limits.max_position_per_market, Decimal::new(1000, 0));
    }
}
