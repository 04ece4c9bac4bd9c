//! # Payout records — idempotent per-member settlement distribution
//!
//! Finalizing a question writes one [`PayoutRecord`] per winner, keyed by
//! `question:member`. Each record is then credited in its own unit of
//! work, so a failure midway through a batch leaves already-paid members
//! marked and only the rest eligible for retry.
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐  credit ok   ┌───────────┐
//!   │ PENDING ├─────────────▶│ SUCCEEDED │
//!   └───┬─────┘              └───────────┘
//!       │ credit failed          ▲
//!       ▼                        │ retry ok
//!   ┌────────┐───────────────────┘
//!   │ FAILED │
//!   └────────┘
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{MemberId, QuestionId};

/// Deterministic idempotency key of one member's payout for one question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PayoutKey(String);

impl PayoutKey {
    #[must_use]
    pub fn new(question_id: QuestionId, member_id: MemberId) -> Self {
        Self(format!("{question_id}:{member_id}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayoutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Distribution status of a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayoutStatus {
    Pending,
    Succeeded,
    Failed,
}

impl PayoutStatus {
    /// SUCCEEDED is terminal; PENDING and FAILED may move to either outcome.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending | Self::Failed, Self::Succeeded | Self::Failed)
        )
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// One winner's payout for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub key: PayoutKey,
    pub question_id: QuestionId,
    pub member_id: MemberId,
    /// Stake the payout was computed from (winning position quantity).
    pub stake: Decimal,
    pub amount: Decimal,
    pub status: PayoutStatus,
    /// Credit attempts made so far.
    pub attempts: u32,
    pub last_error: Option<String>,
    /// SHA-256 over `key || stake || amount`; a retry must match it.
    pub plan_digest: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl PayoutRecord {
    #[must_use]
    pub fn planned(question_id: QuestionId, member_id: MemberId, stake: Decimal, amount: Decimal) -> Self {
        let key = PayoutKey::new(question_id, member_id);
        let plan_digest = Self::digest(&key, stake, amount);
        Self {
            key,
            question_id,
            member_id,
            stake,
            amount,
            status: PayoutStatus::Pending,
            attempts: 0,
            last_error: None,
            plan_digest,
            completed_at: None,
            version: 0,
        }
    }

    /// Hex SHA-256 commitment to the planned amount.
    #[must_use]
    pub fn digest(key: &PayoutKey, stake: Decimal, amount: Decimal) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_str().as_bytes());
        hasher.update(stake.normalize().to_string().as_bytes());
        hasher.update(amount.normalize().to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Whether the stored digest still matches the record's amounts.
    #[must_use]
    pub fn plan_intact(&self) -> bool {
        self.plan_digest == Self::digest(&self.key, self.stake, self.amount)
    }

    /// Eligible for another credit attempt.
    #[must_use]
    pub fn is_retryable(&self, max_attempts: u32) -> bool {
        self.status != PayoutStatus::Succeeded && self.attempts < max_attempts
    }

    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.status == PayoutStatus::Succeeded
    }
}
