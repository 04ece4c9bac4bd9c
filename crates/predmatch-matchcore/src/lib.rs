//! # predmatch-matchcore
//!
//! **Order matching and position accounting for PredMatch.**
//!
//! MatchCore is the trading plane of a binary question. It:
//!
//! - **Matches complementary orders**: BUY YES meets BUY NO (minting a
//!   pair) or SELL YES; SELL meets BUY on the same side
//! - **Reserves before matching**: BUY orders freeze `quantity × price`,
//!   SELL orders lock their shares
//! - **Keeps members single-sided**: opposite holdings of a regular member
//!   net against each other at fill time
//! - **Commits atomically**: one unit of work per submission, serialized
//!   per question
//! - **Seeds liquidity**: the house market maker ladders both sides when
//!   betting opens

pub mod lifecycle;
pub mod market_maker;
pub mod matcher;
pub mod orderbook;
pub mod position_ledger;
pub mod price_level;

pub use lifecycle::QuestionLifecycle;
pub use market_maker::{MarketMaker, SeedOutcome};
pub use matcher::{CancelResponse, MatchingEngine, OrderResponse, SubmitOutcome};
pub use orderbook::{OrderBook, OrderBookSnapshot, PriceInfo};
pub use position_ledger::{PositionLedger, PositionUpdate};
pub use price_level::{LevelSnapshot, PriceLevel};
