//! System-wide constants for the PredMatch core.

/// Decimal places kept for average position cost.
pub const AVG_PRICE_SCALE: u32 = 2;

/// Decimal places kept for the mid price.
pub const MID_PRICE_SCALE: u32 = 2;

/// Decimal places kept for the settlement payout ratio.
pub const PAYOUT_RATIO_SCALE: u32 = 10;

/// Reserved account number of the house market maker.
pub const MARKET_MAKER_ACCOUNT: u128 = 1;

/// House-funded starting liquidity per side of every question.
pub const DEFAULT_INITIAL_LIQUIDITY: i64 = 500;

/// Maximum shares a member may hold per question (YES + NO).
pub const DEFAULT_MAX_POSITION_PER_MARKET: i64 = 1_000;

/// Maximum notional of a single BUY order.
pub const DEFAULT_MAX_ORDER_VALUE: i64 = 500;

/// Trades per window that trip the circuit breaker.
pub const DEFAULT_CIRCUIT_BREAKER_TRADES: usize = 100;

/// Circuit-breaker trailing window in seconds.
pub const DEFAULT_CIRCUIT_BREAKER_WINDOW_SECS: u64 = 60;

/// Cooldown hint reported to callers when the breaker trips.
pub const DEFAULT_CIRCUIT_BREAKER_COOLDOWN_SECS: u64 = 30;

/// Settlement fee multiplier numerator (0.99 = 1% protocol fee), in hundredths.
pub const SETTLEMENT_FEE_MULTIPLIER_HUNDREDTHS: i64 = 99;

/// Dispute window in seconds. Zero means immediately finalizable.
pub const DEFAULT_DISPUTE_WINDOW_SECS: u64 = 0;

/// Attempts allowed per payout idempotency key.
pub const MAX_PAYOUT_ATTEMPTS: u32 = 3;

/// Attempts allowed for a unit of work hitting version conflicts.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Base backoff between conflict retries, multiplied by the attempt number.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 50;

/// Upper bound on a blockchain mirror call.
pub const CHAIN_MIRROR_TIMEOUT_SECS: u64 = 30;

/// Market-maker ladder: shares per level.
pub const MARKET_MAKER_SHARES_PER_LEVEL: i64 = 200;

/// Market-maker inventory granted per side before seeding.
pub const MARKET_MAKER_INVENTORY_PER_SIDE: i64 = 1_000;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "PredMatch";
