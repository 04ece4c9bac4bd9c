//! Member balance rows.
//!
//! Every member has an `available` balance (usable for new orders) and a
//! `frozen` balance (reserved by resting BUY orders).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance row of one member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceEntry {
    /// Available for new orders / withdrawal.
    pub available: Decimal,
    /// Reserved by resting BUY orders.
    pub frozen: Decimal,
    /// Optimistic-concurrency version.
    pub version: u64,
}

impl BalanceEntry {
    /// Create a zero balance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: Decimal::ZERO,
            frozen: Decimal::ZERO,
            version: 0,
        }
    }

    /// Total balance (available + frozen).
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.available + self.frozen
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available.is_zero() && self.frozen.is_zero()
    }
}

impl Default for BalanceEntry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_entry_default_is_zero() {
        let entry = BalanceEntry::default();
        assert!(entry.is_zero());
        assert_eq!(entry.version, 0);
    }

    #[test]
    fn balance_entry_total() {
        let entry = BalanceEntry {
            available: Decimal::new(100, 0),
            frozen: Decimal::new(50, 0),
            version: 3,
        };
        assert_eq!(entry.total(), Decimal::new(150, 0));
        assert!(!entry.is_zero());
    }
}
