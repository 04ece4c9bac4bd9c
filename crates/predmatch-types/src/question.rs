//! Question (market) lifecycle types.
//!
//! A question moves through
//! **VOTING → BREAK → BETTING → TENTATIVE → SETTLED**.
//!
//! Orders are accepted only during BETTING. TENTATIVE carries a proposed
//! result and a dispute deadline; a dispute can send the question back to
//! BETTING (or to CLOSED once it has expired). SETTLED is terminal.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{QuestionId, Side};

/// Lifecycle status of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionStatus {
    /// Members vote on the outcome; no trading.
    Voting,
    /// Pause between voting and trading.
    Break,
    /// Order book open.
    Betting,
    /// Expired without a confirmed result.
    Closed,
    /// Result proposed, dispute window running.
    Tentative,
    /// Payouts computed; terminal.
    Settled,
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Voting => write!(f, "VOTING"),
            Self::Break => write!(f, "BREAK"),
            Self::Betting => write!(f, "BETTING"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Tentative => write!(f, "TENTATIVE"),
            Self::Settled => write!(f, "SETTLED"),
        }
    }
}

impl QuestionStatus {
    /// Phases from which a settlement may be initiated.
    #[must_use]
    pub fn can_initiate_settlement(self) -> bool {
        matches!(
            self,
            Self::Voting | Self::Break | Self::Betting | Self::Closed
        )
    }

    /// Phases during which the order book is reported empty.
    #[must_use]
    pub fn is_pre_trading(self) -> bool {
        matches!(self, Self::Voting | Self::Break)
    }
}

/// Resolved (or pending) outcome of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FinalResult {
    Yes,
    No,
    Pending,
}

impl FinalResult {
    /// The side that wins, or `None` while the result is pending.
    #[must_use]
    pub fn winning_side(self) -> Option<Side> {
        match self {
            Self::Yes => Some(Side::Yes),
            Self::No => Some(Side::No),
            Self::Pending => None,
        }
    }
}

impl fmt::Display for FinalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "YES"),
            Self::No => write!(f, "NO"),
            Self::Pending => write!(f, "PENDING"),
        }
    }
}

/// Pool totals of a question, in shares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pools {
    pub total: Decimal,
    pub yes: Decimal,
    pub no: Decimal,
}

impl Pools {
    /// Pools seeded with the house subsidy on both sides.
    #[must_use]
    pub fn seeded(initial_liquidity: Decimal) -> Self {
        Self {
            total: initial_liquidity * Decimal::TWO,
            yes: initial_liquidity,
            no: initial_liquidity,
        }
    }

    #[must_use]
    pub fn side(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes,
            Side::No => self.no,
        }
    }

    /// Credit a filled quantity to one side and to the total.
    pub fn add(&mut self, side: Side, qty: Decimal) {
        match side {
            Side::Yes => self.yes += qty,
            Side::No => self.no += qty,
        }
        self.total += qty;
    }
}

/// A binary prediction market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub title: String,
    pub status: QuestionStatus,
    pub pools: Pools,
    /// House subsidy per side, fixed at creation.
    pub initial_liquidity: Decimal,
    pub final_result: FinalResult,
    pub source_ref: Option<String>,
    /// Present only while a settlement is pending (TENTATIVE).
    pub dispute_deadline: Option<DateTime<Utc>>,
    /// Trading closes at this instant.
    pub expires_at: DateTime<Utc>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Question {
    #[must_use]
    pub fn new(title: impl Into<String>, initial_liquidity: Decimal, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: QuestionId::new(),
            title: title.into(),
            status: QuestionStatus::Voting,
            pools: Pools::seeded(initial_liquidity),
            initial_liquidity,
            final_result: FinalResult::Pending,
            source_ref: None,
            dispute_deadline: None,
            expires_at,
            version: 0,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// A settlement has been proposed and not yet finalized.
    #[must_use]
    pub fn has_pending_settlement(&self) -> bool {
        self.status == QuestionStatus::Tentative && self.dispute_deadline.is_some()
    }
}
