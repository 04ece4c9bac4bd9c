//! House liquidity seeding.
//!
//! When a question enters BETTING the market-maker account receives share
//! inventory on both sides and places a fixed ladder of BUY and SELL limit
//! orders per side through the normal submission path. Seeding is
//! idempotent: a question on which the account already rests an order is
//! left alone. Failures are logged and never propagated to the caller.

use std::sync::{Arc, Mutex, PoisonError};

use predmatch_types::{
    AuditAction, Direction, MarketMakerConfig, OrderRequest, PositionKey, QuestionId, QuestionStatus,
    Result, Side,
};

use crate::MatchingEngine;

/// Result of a seeding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Orders were placed; `failed` counts rejected levels.
    Seeded { placed: usize, failed: usize },
    /// The market maker already rests orders on the question.
    AlreadySeeded,
    /// Disabled, question missing or not in BETTING, or inventory grant failed.
    Skipped,
}

#[derive(Debug)]
pub struct MarketMaker {
    engine: Arc<MatchingEngine>,
    config: MarketMakerConfig,
    /// Serializes seeding so two callers cannot both pass the idempotency check.
    seeding: Mutex<()>,
}

impl MarketMaker {
    #[must_use]
    pub fn new(engine: Arc<MatchingEngine>, config: MarketMakerConfig) -> Self {
        Self {
            engine,
            config,
            seeding: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &MarketMakerConfig {
        &self.config
    }

    /// Seed the book of `question_id` unless already seeded.
    pub fn seed_if_needed(&self, question_id: QuestionId) -> SeedOutcome {
        if !self.config.enabled {
            return SeedOutcome::Skipped;
        }
        let _seeding = self.seeding.lock().unwrap_or_else(PoisonError::into_inner);

        let store = self.engine.store();
        match store.question(question_id) {
            Some(q) if q.status == QuestionStatus::Betting => {}
            Some(q) => {
                tracing::info!(question = %question_id, status = %q.status, "Not in BETTING, seeding skipped");
                return SeedOutcome::Skipped;
            }
            None => {
                tracing::warn!(question = %question_id, "Question not found, seeding skipped");
                return SeedOutcome::Skipped;
            }
        }

        if !self.engine.open_orders(self.config.member_id, question_id).is_empty() {
            tracing::info!(question = %question_id, "Already seeded, skipping");
            return SeedOutcome::AlreadySeeded;
        }

        if let Err(err) = self.grant_inventory(question_id) {
            tracing::error!(question = %question_id, error = %err, "Inventory grant failed");
            return SeedOutcome::Skipped;
        }

        let mut placed = 0;
        let mut failed = 0;
        for side in [Side::Yes, Side::No] {
            let ladder = self
                .config
                .bid_levels
                .iter()
                .map(|p| (Direction::Buy, *p))
                .chain(self.config.ask_levels.iter().map(|p| (Direction::Sell, *p)));
            for (direction, price) in ladder {
                let request = OrderRequest::limit(
                    self.config.member_id,
                    question_id,
                    side,
                    direction,
                    price,
                    self.config.shares_per_level,
                );
                let response = self.engine.create_order(&request);
                if response.success {
                    placed += 1;
                    tracing::debug!(question = %question_id, %side, %direction, %price, "Seed order placed");
                } else {
                    failed += 1;
                    tracing::error!(
                        question = %question_id,
                        %side,
                        %direction,
                        %price,
                        message = %response.message,
                        "Seed order failed"
                    );
                }
            }
        }

        tracing::info!(question = %question_id, placed, failed, "Order book seeded");
        self.engine.audit().log(
            Some(self.config.member_id),
            AuditAction::MarketSeed,
            "QUESTION",
            Some(question_id.to_string()),
            &format!("placed {placed} levels, {failed} failed"),
        );
        SeedOutcome::Seeded { placed, failed }
    }

    fn grant_inventory(&self, question_id: QuestionId) -> Result<()> {
        let store = self.engine.store();
        let lock = store.question_lock(question_id);
        let updates = self.engine.retry_policy().run_locked(&lock, || {
            let mut uow = store.begin();
            let updates: Vec<_> = [Side::Yes, Side::No]
                .into_iter()
                .map(|side| {
                    let key = PositionKey::new(self.config.member_id, question_id, side);
                    self.engine
                        .positions()
                        .grant_inventory(&mut uow, key, self.config.inventory_per_side)
                })
                .collect();
            uow.commit()?;
            Ok(updates)
        })?;
        self.engine.audit_position_updates(&updates);
        Ok(())
    }
}
