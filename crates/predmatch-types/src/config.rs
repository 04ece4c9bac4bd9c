//! Engine configuration.
//!
//! Every section implements `Default` and is `#[serde(default)]`, so a
//! JSON file only needs the keys it overrides.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MemberId, PredmatchError, Result, RiskLimits, constants};

/// Top-level configuration of a PredMatch instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub risk: RiskLimits,
    pub market_maker: MarketMakerConfig,
    pub settlement: SettlementConfig,
    pub retry: RetryConfig,
    pub chain_mirror: ChainMirrorConfig,
}

impl EngineConfig {
    /// Parse from JSON and validate.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.risk.max_position_per_market <= Decimal::ZERO {
            return Err(PredmatchError::Configuration(
                "risk.max_position_per_market must be positive".into(),
            ));
        }
        if self.risk.max_order_value <= Decimal::ZERO {
            return Err(PredmatchError::Configuration(
                "risk.max_order_value must be positive".into(),
            ));
        }
        if self.risk.circuit_breaker.trade_count_threshold == 0 {
            return Err(PredmatchError::Configuration(
                "risk.circuit_breaker.trade_count_threshold must be > 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(PredmatchError::Configuration(
                "retry.max_attempts must be > 0".into(),
            ));
        }
        if self.settlement.max_payout_attempts == 0 {
            return Err(PredmatchError::Configuration(
                "settlement.max_payout_attempts must be > 0".into(),
            ));
        }
        if self.settlement.fee_multiplier <= Decimal::ZERO || self.settlement.fee_multiplier > Decimal::ONE {
            return Err(PredmatchError::Configuration(
                "settlement.fee_multiplier must be in (0, 1]".into(),
            ));
        }
        self.market_maker.validate()
    }
}

/// House liquidity seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketMakerConfig {
    pub enabled: bool,
    pub member_id: MemberId,
    /// BUY ladder prices, best first.
    pub bid_levels: Vec<Decimal>,
    /// SELL ladder prices, best first.
    pub ask_levels: Vec<Decimal>,
    pub shares_per_level: Decimal,
    /// Inventory granted per side before the SELL levels are placed.
    pub inventory_per_side: Decimal,
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            member_id: MemberId::market_maker(),
            bid_levels: vec![Decimal::new(48, 2), Decimal::new(46, 2), Decimal::new(44, 2)],
            ask_levels: vec![Decimal::new(52, 2), Decimal::new(54, 2), Decimal::new(56, 2)],
            shares_per_level: Decimal::from(constants::MARKET_MAKER_SHARES_PER_LEVEL),
            inventory_per_side: Decimal::from(constants::MARKET_MAKER_INVENTORY_PER_SIDE),
        }
    }
}

impl MarketMakerConfig {
    fn validate(&self) -> Result<()> {
        let in_range = |p: &Decimal| *p > Decimal::ZERO && *p < Decimal::ONE;
        if !self.bid_levels.iter().chain(&self.ask_levels).all(in_range) {
            return Err(PredmatchError::Configuration(
                "market_maker ladder prices must lie in (0, 1)".into(),
            ));
        }
        let needed = self.shares_per_level * Decimal::from(self.ask_levels.len());
        if self.inventory_per_side < needed {
            return Err(PredmatchError::Configuration(format!(
                "market_maker.inventory_per_side {} cannot cover {} ask shares",
                self.inventory_per_side, needed
            )));
        }
        Ok(())
    }
}

/// Two-phase settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Dispute window length. Zero makes a tentative result immediately finalizable.
    pub dispute_window_secs: u64,
    /// Share of the effective pool paid out (0.99 = 1% fee).
    pub fee_multiplier: Decimal,
    pub max_payout_attempts: u32,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            dispute_window_secs: constants::DEFAULT_DISPUTE_WINDOW_SECS,
            fee_multiplier: Decimal::new(constants::SETTLEMENT_FEE_MULTIPLIER_HUNDREDTHS, 2),
            max_payout_attempts: constants::MAX_PAYOUT_ATTEMPTS,
        }
    }
}

/// Conflict retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Sleep `backoff_ms × attempt` between attempts.
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_RETRY_ATTEMPTS,
            backoff_ms: constants::DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

/// Blockchain mirroring of settlement results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainMirrorConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
}

impl Default for ChainMirrorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: constants::CHAIN_MIRROR_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = EngineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.settlement.fee_multiplier, Decimal::new(99, 2));
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.backoff_ms, 50);
        assert_eq!(cfg.chain_mirror.timeout_secs, 30);
        assert_eq!(cfg.market_maker.member_id, MemberId::market_maker());
    }

    #[test]
    fn empty_json_yields_defaults() {
        let cfg = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg.market_maker.bid_levels.len(), 3);
        assert_eq!(cfg.market_maker.ask_levels[0], Decimal::new(52, 2));
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = EngineConfig::from_json_str(
            r#"{"risk":{"circuit_breaker":{"trade_count_threshold":5}},"settlement":{"dispute_window_secs":3600}}"#,
        )
        .unwrap();
        assert_eq!(cfg.risk.circuit_breaker.trade_count_threshold, 5);
        assert_eq!(cfg.risk.circuit_breaker.window_secs, 60);
        assert_eq!(cfg.settlement.dispute_window_secs, 3600);
    }

    #[test]
    fn invalid_ladder_rejected() {
        let err = EngineConfig::from_json_str(r#"{"market_maker":{"bid_levels":["1.2"]}}"#).unwrap_err();
        assert!(matches!(err, PredmatchError::Configuration(_)));
    }

    #[test]
    fn inventory_must_cover_asks() {
        let err = EngineConfig::from_json_str(r#"{"market_maker":{"inventory_per_side":"100"}}"#).unwrap_err();
        assert!(err.to_string().contains("cannot cover"));
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, PredmatchError::Serialization(_)));
    }
}
