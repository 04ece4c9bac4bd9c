//! Read-side order book of a single question, on the YES price axis.
//!
//! Uses `BTreeMap` for price-level ordering:
//! - **Bids** (YES demand): BUY YES at `p`, SELL NO at `1 - q` --
//!   `BTreeMap<Reverse<Decimal>, PriceLevel>`, highest price first
//! - **Asks** (YES supply): BUY NO at `1 - q`, SELL YES at `p` --
//!   `BTreeMap<Decimal, PriceLevel>`, lowest price first
//!
//! The book is rebuilt from resting orders on demand; it is never the
//! source of truth.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use predmatch_persistence::Store;
use predmatch_types::{Order, PredmatchError, QuestionId, Result, Trade, constants};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::price_level::{LevelSnapshot, PriceLevel};

/// Aggregated book of one question.
#[derive(Debug)]
pub struct OrderBook {
    pub question_id: QuestionId,
    /// YES bids: highest price first (`Reverse` key).
    bids: BTreeMap<Reverse<Decimal>, PriceLevel>,
    /// YES asks: lowest price first.
    asks: BTreeMap<Decimal, PriceLevel>,
}

impl OrderBook {
    #[must_use]
    pub fn new(question_id: QuestionId) -> Self {
        Self {
            question_id,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    /// Build a book from resting orders. Orders of other questions and
    /// terminal orders are ignored.
    #[must_use]
    pub fn from_orders(question_id: QuestionId, orders: impl IntoIterator<Item = Order>) -> Self {
        let mut book = Self::new(question_id);
        for order in orders {
            book.insert_order(order);
        }
        book
    }

    /// Committed book of a question. Empty before BETTING.
    pub fn load(store: &Store, question_id: QuestionId) -> Result<Self> {
        let question = store
            .question(question_id)
            .ok_or(PredmatchError::QuestionNotFound(question_id))?;
        if question.status.is_pre_trading() {
            return Ok(Self::new(question_id));
        }
        Ok(Self::from_orders(question_id, store.resting_orders(question_id)))
    }

    // =================================================================
    // Insertion
    // =================================================================

    /// Insert a resting order at its YES-axis price.
    pub fn insert_order(&mut self, order: Order) {
        if order.question_id != self.question_id || !order.status.is_resting() {
            return;
        }
        let price = order.yes_axis_price();
        if order.is_yes_bid() {
            self.bids
                .entry(Reverse(price))
                .or_insert_with(|| PriceLevel::new(price))
                .push_back(order);
        } else {
            self.asks
                .entry(price)
                .or_insert_with(|| PriceLevel::new(price))
                .push_back(order);
        }
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Best (highest) YES bid, or `None` if no bids.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next().map(|r| r.0)
    }

    /// Best (lowest) YES ask, or `None` if no asks.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// Spread = best_ask - best_bid. `None` if either side is empty.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Mid price = (best_bid + best_ask) / 2, rounded to 2 dp half-up.
    /// `None` if either side is empty.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(
                ((bid + ask) / Decimal::TWO)
                    .round_dp_with_strategy(constants::MID_PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero),
            ),
            _ => None,
        }
    }

    /// Total number of orders in the book.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.bids.values().chain(self.asks.values()).map(PriceLevel::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Bid levels from best (highest) to worst.
    pub fn bid_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.bids.values()
    }

    /// Ask levels from best (lowest) to worst.
    pub fn ask_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.asks.values()
    }

    // =================================================================
    // Snapshots
    // =================================================================

    /// Aggregated levels plus last trade price and spread.
    #[must_use]
    pub fn snapshot(&self, last_trade: Option<&Trade>) -> OrderBookSnapshot {
        OrderBookSnapshot {
            question_id: self.question_id,
            bids: self.bid_levels().map(PriceLevel::snapshot).collect(),
            asks: self.ask_levels().map(PriceLevel::snapshot).collect(),
            last_price: last_trade.map(Trade::yes_price),
            spread: self.spread(),
        }
    }

    /// Summary prices.
    #[must_use]
    pub fn price_info(&self, last_trade: Option<&Trade>) -> PriceInfo {
        PriceInfo {
            question_id: self.question_id,
            mid_price: self.mid_price(),
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            last_trade_price: last_trade.map(Trade::yes_price),
            spread: self.spread(),
        }
    }
}

/// Depth view of a question's book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub question_id: QuestionId,
    /// Highest price first.
    pub bids: Vec<LevelSnapshot>,
    /// Lowest price first.
    pub asks: Vec<LevelSnapshot>,
    /// Last trade price on the YES axis.
    pub last_price: Option<Decimal>,
    pub spread: Option<Decimal>,
}

/// Top-of-book prices of a question, all on the YES axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceInfo {
    pub question_id: QuestionId,
    pub mid_price: Option<Decimal>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub last_trade_price: Option<Decimal>,
    pub spread: Option<Decimal>,
}
