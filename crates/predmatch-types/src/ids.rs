//! Identifiers used throughout PredMatch.
//!
//! Entity IDs are UUIDv7 so they sort by creation time. System accounts
//! (the market maker) use small reserved UUIDs so they stay stable across
//! restarts and configuration files.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// OrderId
// ---------------------------------------------------------------------------

/// Globally unique order identifier. Uses UUIDv7 for time-ordered sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MemberId
// ---------------------------------------------------------------------------

/// A trading account. Regular members get UUIDv7 ids; system accounts use
/// [`MemberId::system`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MemberId(pub Uuid);

impl MemberId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Reserved account id for house-operated accounts.
    #[must_use]
    pub const fn system(n: u128) -> Self {
        Self(Uuid::from_u128(n))
    }

    /// The default market-maker account.
    #[must_use]
    pub const fn market_maker() -> Self {
        Self::system(crate::constants::MARKET_MAKER_ACCOUNT)
    }
}

impl Default for MemberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// QuestionId
// ---------------------------------------------------------------------------

/// A prediction question (one binary market).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct QuestionId(pub Uuid);

impl QuestionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for QuestionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TradeId
// ---------------------------------------------------------------------------

/// Identifier of a single fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TradeId(pub Uuid);

impl TradeId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TradeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_ids_are_time_ordered() {
        let a = OrderId::new();
        let b = OrderId::new();
        assert!(a < b, "UUIDv7 ids must sort by creation");
    }

    #[test]
    fn system_member_ids_are_stable() {
        assert_eq!(MemberId::market_maker(), MemberId::market_maker());
        assert_ne!(MemberId::market_maker(), MemberId::new());
        assert_eq!(
            MemberId::system(1).to_string(),
            "00000000-0000-0000-0000-000000000001"
        );
    }

    #[test]
    fn question_id_serde_roundtrip() {
        let id = QuestionId::new();
        let json = serde_json::to_string(&id).unwrap();
        let back: QuestionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
