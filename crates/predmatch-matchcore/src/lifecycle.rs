//! Question lifecycle: creation and the trading-phase transitions.
//!
//! ```text
//! VOTING ──open_break──▶ BREAK ──open_betting──▶ BETTING ──expire──▶ CLOSED
//! ```
//!
//! Settlement transitions (TENTATIVE, SETTLED) live in the settlement
//! crate. Market-maker seeding runs after `open_betting` has committed and
//! never undoes the transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use predmatch_types::{PredmatchError, Question, QuestionId, QuestionStatus, Result};
use rust_decimal::Decimal;

use crate::{MarketMaker, MatchingEngine, SeedOutcome};

#[derive(Debug)]
pub struct QuestionLifecycle {
    engine: Arc<MatchingEngine>,
    market_maker: Arc<MarketMaker>,
}

impl QuestionLifecycle {
    #[must_use]
    pub fn new(engine: Arc<MatchingEngine>, market_maker: Arc<MarketMaker>) -> Self {
        Self { engine, market_maker }
    }

    /// Create a question in VOTING with pools seeded by the subsidy.
    pub fn create_question(
        &self,
        title: impl Into<String>,
        initial_liquidity: Decimal,
        expires_at: DateTime<Utc>,
    ) -> Result<Question> {
        if initial_liquidity < Decimal::ZERO {
            return Err(PredmatchError::Configuration(
                "initial liquidity must not be negative".into(),
            ));
        }
        let question = Question::new(title, initial_liquidity, expires_at);
        let mut uow = self.engine.store().begin();
        uow.put_question(question.clone());
        uow.commit()?;
        tracing::info!(question = %question.id, title = %question.title, "Question created");
        self.engine
            .store()
            .question(question.id)
            .ok_or(PredmatchError::QuestionNotFound(question.id))
    }

    /// VOTING → BREAK.
    pub fn open_break(&self, question_id: QuestionId) -> Result<Question> {
        self.transition(question_id, "open break", |q, _| {
            (q.status == QuestionStatus::Voting).then_some(QuestionStatus::Break)
        })
    }

    /// BREAK → BETTING, then seed the book.
    pub fn open_betting(&self, question_id: QuestionId) -> Result<(Question, SeedOutcome)> {
        let question = self.transition(question_id, "open betting", |q, _| {
            (q.status == QuestionStatus::Break).then_some(QuestionStatus::Betting)
        })?;
        let seeded = self.market_maker.seed_if_needed(question_id);
        Ok((question, seeded))
    }

    /// BETTING → CLOSED once `expires_at` has passed. Resting orders are
    /// cancelled and their reservations released.
    pub fn expire(&self, question_id: QuestionId, now: DateTime<Utc>) -> Result<Question> {
        let engine = &self.engine;
        let lock = engine.store().question_lock(question_id);
        let (question, updates) = engine.retry_policy().run_locked(&lock, || {
            let mut uow = engine.store().begin();
            let mut question = uow.require_question(question_id)?;
            if question.status != QuestionStatus::Betting || !question.is_expired(now) {
                return Err(PredmatchError::InvalidPhaseTransition {
                    from: question.status,
                    action: "expire",
                });
            }
            let (cancelled, updates) = engine.cancel_resting_in(&mut uow, question_id, now)?;
            question.status = QuestionStatus::Closed;
            uow.put_question(question.clone());
            uow.commit()?;
            tracing::info!(question = %question_id, cancelled, "Question closed");
            Ok((question, updates))
        })?;
        engine.audit_position_updates(&updates);
        Ok(question)
    }

    fn transition(
        &self,
        question_id: QuestionId,
        action: &'static str,
        next: impl Fn(&Question, DateTime<Utc>) -> Option<QuestionStatus>,
    ) -> Result<Question> {
        let store = self.engine.store();
        let lock = store.question_lock(question_id);
        self.engine.retry_policy().run_locked(&lock, || {
            let mut uow = store.begin();
            let mut question = uow.require_question(question_id)?;
            let from = question.status;
            let to = next(&question, Utc::now()).ok_or(PredmatchError::InvalidPhaseTransition { from, action })?;
            question.status = to;
            uow.put_question(question.clone());
            uow.commit()?;
            tracing::info!(question = %question_id, %from, %to, "Question status changed");
            Ok(question)
        })
    }
}
