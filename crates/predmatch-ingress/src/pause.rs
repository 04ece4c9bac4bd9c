//! Operator pause switches.
//!
//! A global switch stops order entry on every question; per-question
//! switches stop a single market. State is process-local and resets on
//! restart.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use predmatch_types::{PredmatchError, QuestionId, Result};

#[derive(Debug, Default)]
pub struct PauseRegistry {
    global: AtomicBool,
    questions: RwLock<HashSet<QuestionId>>,
}

impl PauseRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause_all(&self) {
        self.global.store(true, Ordering::SeqCst);
        tracing::info!("Trading paused globally");
    }

    pub fn resume_all(&self) {
        self.global.store(false, Ordering::SeqCst);
        tracing::info!("Trading resumed globally");
    }

    pub fn pause(&self, question_id: QuestionId) {
        self.questions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(question_id);
        tracing::info!(question = %question_id, "Trading paused");
    }

    pub fn resume(&self, question_id: QuestionId) {
        self.questions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&question_id);
        tracing::info!(question = %question_id, "Trading resumed");
    }

    #[must_use]
    pub fn is_paused(&self, question_id: QuestionId) -> bool {
        self.global.load(Ordering::SeqCst)
            || self
                .questions
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&question_id)
    }

    /// # Errors
    /// `MarketPaused` if either switch is on.
    pub fn ensure_open(&self, question_id: QuestionId) -> Result<()> {
        if self.is_paused(question_id) {
            return Err(PredmatchError::MarketPaused);
        }
        Ok(())
    }
}
