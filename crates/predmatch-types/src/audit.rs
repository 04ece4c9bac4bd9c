//! Audit-trail and money-ledger records.
//!
//! Two append-only streams:
//! - [`LedgerEntry`]: every balance movement, written inside the same unit
//!   of work as the movement itself.
//! - [`AuditEntry`]: business events (order created, risk rejection,
//!   settlement...), written best-effort after commit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MemberId, QuestionId};

/// Business event recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    OrderCreate,
    OrderCancel,
    /// Order refused by a business rule (paused, not trading, expired...).
    OrderReject,
    /// Order refused by the risk guard.
    RiskReject,
    PositionUpdate,
    MarketSeed,
    Settle,
    SettlementCancel,
    Payout,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrderCreate => write!(f, "ORDER_CREATE"),
            Self::OrderCancel => write!(f, "ORDER_CANCEL"),
            Self::OrderReject => write!(f, "ORDER_REJECT"),
            Self::RiskReject => write!(f, "RISK_REJECT"),
            Self::PositionUpdate => write!(f, "POSITION_UPDATE"),
            Self::MarketSeed => write!(f, "MARKET_SEED"),
            Self::Settle => write!(f, "SETTLE"),
            Self::SettlementCancel => write!(f, "SETTLEMENT_CANCEL"),
            Self::Payout => write!(f, "PAYOUT"),
        }
    }
}

/// One audit-trail record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub member_id: Option<MemberId>,
    pub action: AuditAction,
    /// Entity kind, e.g. `"ORDER"`, `"QUESTION"`, `"POSITION"`.
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    #[must_use]
    pub fn new(
        member_id: Option<MemberId>,
        action: AuditAction,
        entity_type: &str,
        entity_id: Option<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            member_id,
            action,
            entity_type: entity_type.to_string(),
            entity_id,
            detail: detail.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Kind of balance movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerKind {
    Deposit,
    /// Funds reserved for a BUY order.
    Bet,
    /// Reserved funds returned (cancel, IOC remainder, price improvement).
    Refund,
    /// Proceeds of a SELL fill.
    SellSettlement,
    /// Winnings paid at settlement.
    Payout,
}

impl std::fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deposit => write!(f, "DEPOSIT"),
            Self::Bet => write!(f, "BET"),
            Self::Refund => write!(f, "REFUND"),
            Self::SellSettlement => write!(f, "SELL_SETTLEMENT"),
            Self::Payout => write!(f, "PAYOUT"),
        }
    }
}

/// One balance movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub member_id: MemberId,
    pub kind: LedgerKind,
    /// Signed change of the available balance.
    pub delta: Decimal,
    /// Available balance after the movement.
    pub balance_after: Decimal,
    pub description: String,
    pub question_id: Option<QuestionId>,
    pub recorded_at: DateTime<Utc>,
}
