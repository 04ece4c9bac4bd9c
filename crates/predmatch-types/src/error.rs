//! Error types for the PredMatch core.
//!
//! All errors use the `PM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order errors
//! - 2xx: Balance / position errors
//! - 3xx: Market lifecycle errors
//! - 4xx: Risk errors
//! - 5xx: Matching errors
//! - 6xx: Settlement errors
//! - 7xx: Collaborator errors
//! - 8xx: Concurrency errors
//! - 9xx: General / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{OrderId, OrderStatus, QuestionId, QuestionStatus, RiskRejectionReason};

/// Central error enum for all PredMatch operations.
#[derive(Debug, Error)]
pub enum PredmatchError {
    // =================================================================
    // Order Errors (1xx)
    // =================================================================
    /// The requested order does not exist.
    #[error("PM_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Malformed price or quantity.
    #[error("PM_ERR_101: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// The order is already FILLED or CANCELLED.
    #[error("PM_ERR_102: Order cannot be cancelled in status {status}")]
    OrderNotCancellable { status: OrderStatus },

    /// Caller does not own the order.
    #[error("PM_ERR_103: Order {0} belongs to another member")]
    NotOrderOwner(OrderId),

    /// A MARKET order found nothing to execute against.
    #[error("PM_ERR_104: Market order failed: no executable quotes available")]
    NoExecutableQuotes,

    // =================================================================
    // Balance / Position Errors (2xx)
    // =================================================================
    /// Not enough available balance.
    #[error("PM_ERR_200: Insufficient available balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },

    /// Frozen balance smaller than the amount being consumed or released.
    #[error("PM_ERR_201: Insufficient frozen balance: need {needed}, have {frozen}")]
    InsufficientFrozen { needed: Decimal, frozen: Decimal },

    /// Not enough unreserved shares to sell.
    #[error("PM_ERR_202: Insufficient available position to sell: need {needed}, have {available}")]
    InsufficientPosition { needed: Decimal, available: Decimal },

    // =================================================================
    // Market Lifecycle Errors (3xx)
    // =================================================================
    #[error("PM_ERR_300: Question not found: {0}")]
    QuestionNotFound(QuestionId),

    /// Orders are only accepted while BETTING.
    #[error("PM_ERR_301: Market is not open for trading (status {status})")]
    MarketNotTrading { status: QuestionStatus },

    #[error("PM_ERR_302: Market has expired")]
    MarketExpired,

    /// Trading suspended by an operator.
    #[error("PM_ERR_303: Trading is paused for this market")]
    MarketPaused,

    /// Lifecycle action not allowed from the current status.
    #[error("PM_ERR_304: Cannot {action} from status {from}")]
    InvalidPhaseTransition {
        from: QuestionStatus,
        action: &'static str,
    },

    // =================================================================
    // Risk Errors (4xx)
    // =================================================================
    /// Rejected by the risk guard.
    #[error("PM_ERR_400: Risk check failed: {0}")]
    RiskRejected(RiskRejectionReason),

    // =================================================================
    // Matching Errors (5xx)
    // =================================================================
    #[error("PM_ERR_500: Matching failed: {reason}")]
    MatchingFailed { reason: String },

    /// A fill would leave a member exposed on both sides of a question.
    #[error("PM_ERR_501: Netting violation: {reason}")]
    NettingViolation { reason: String },

    // =================================================================
    // Settlement Errors (6xx)
    // =================================================================
    /// The question was already finalized; nothing is paid twice.
    #[error("PM_ERR_600: Settlement already finalized for question {0}")]
    SettlementAlreadyFinalized(QuestionId),

    #[error("PM_ERR_601: Dispute period has not ended yet (deadline {deadline})")]
    DisputeWindowOpen { deadline: chrono::DateTime<chrono::Utc> },

    #[error("PM_ERR_602: Cannot settle with a pending result")]
    ResultPending,

    #[error("PM_ERR_603: No positions to settle for question {0}")]
    NoPositionsToSettle(QuestionId),

    /// A retried payout no longer matches its committed plan.
    #[error("PM_ERR_604: Payout plan mismatch for {key}")]
    PayoutPlanMismatch { key: String },

    #[error("PM_ERR_605: Payout {key} failed after {attempts} attempts")]
    PayoutAttemptsExhausted { key: String, attempts: u32 },

    // =================================================================
    // Collaborator Errors (7xx)
    // =================================================================
    #[error("PM_ERR_700: Chain mirror failed: {reason}")]
    ChainMirror { reason: String },

    #[error("PM_ERR_701: Chain mirror timed out after {secs}s")]
    ChainMirrorTimeout { secs: u64 },

    #[error("PM_ERR_702: Audit append failed: {reason}")]
    AuditAppend { reason: String },

    // =================================================================
    // Concurrency Errors (8xx)
    // =================================================================
    /// A versioned row changed underneath the unit of work.
    #[error("PM_ERR_800: Concurrent modification of {entity} {id}")]
    ConcurrencyConflict { entity: &'static str, id: String },

    /// Conflict retries used up.
    #[error("PM_ERR_801: Transient failure after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("PM_ERR_802: Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    #[error("PM_ERR_900: Internal error: {0}")]
    Internal(String),

    #[error("PM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    #[error("PM_ERR_902: Configuration error: {0}")]
    Configuration(String),

    #[error("PM_ERR_903: I/O error: {0}")]
    Io(String),
}

impl PredmatchError {
    /// Optimistic-version conflicts are the only retryable errors.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Rule violations that must be audit-logged when refusing an order.
    #[must_use]
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            Self::MarketNotTrading { .. }
                | Self::MarketExpired
                | Self::MarketPaused
                | Self::InvalidPhaseTransition { .. }
                | Self::RiskRejected(_)
                | Self::SettlementAlreadyFinalized(_)
        )
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, PredmatchError>;

impl From<std::io::Error> for PredmatchError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PredmatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
