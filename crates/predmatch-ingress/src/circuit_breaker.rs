//! Trade-rate circuit breaker.
//!
//! # Sliding Window Algorithm
//!
//! Tracks timestamps of recent trades per question. When an order
//! arrives, expired timestamps are pruned. If the count is at or above the
//! threshold, the order is rejected. There is no separate cooldown state:
//! the breaker closes again as soon as enough trades age out of the
//! window. Counters live in memory only and start empty after a restart.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use predmatch_types::{CircuitBreakerConfig, QuestionId, RiskDecision, RiskRejectionReason};

/// Per-question sliding window of trade timestamps.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    /// `QuestionId → execution times of recent trades` (oldest first)
    windows: Mutex<HashMap<QuestionId, VecDeque<DateTime<Utc>>>>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn window(&self) -> Duration {
        Duration::seconds(i64::try_from(self.config.window_secs).unwrap_or(i64::MAX))
    }

    /// Record committed trades of a question.
    pub fn record_trades(&self, question_id: QuestionId, executed_at: impl IntoIterator<Item = DateTime<Utc>>) {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window = windows.entry(question_id).or_default();
        for at in executed_at {
            // Keep the deque ordered even if callers report out of order.
            let pos = window.partition_point(|t| *t <= at);
            window.insert(pos, at);
        }
        // Questions whose newest trade has aged out are forgotten.
        let newest = window.back().copied();
        if let Some(newest) = newest {
            let cutoff = newest - self.window();
            windows.retain(|_, w| w.back().is_some_and(|last| *last > cutoff));
        }
    }

    /// Number of trades inside the trailing window ending at `now`.
    #[must_use]
    pub fn trades_in_window(&self, question_id: QuestionId, now: DateTime<Utc>) -> usize {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(window) = windows.get_mut(&question_id) else {
            return 0;
        };
        let left = Self::prune(window, now - self.window());
        if left == 0 {
            windows.remove(&question_id);
        }
        left
    }

    /// Number of questions with trades still held in memory.
    #[must_use]
    pub fn tracked_questions(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check whether new orders on the question are accepted at `now`.
    #[must_use]
    pub fn check(&self, question_id: QuestionId, now: DateTime<Utc>) -> RiskDecision {
        let trades = self.trades_in_window(question_id, now);
        if trades >= self.config.trade_count_threshold {
            tracing::warn!(
                question = %question_id,
                trades,
                threshold = self.config.trade_count_threshold,
                "Circuit breaker open"
            );
            return RiskDecision::Rejected {
                reason: RiskRejectionReason::CircuitBreakerTripped {
                    trades,
                    window_secs: self.config.window_secs,
                    resume_in_secs: self.config.cooldown_secs,
                },
            };
        }
        RiskDecision::Approved
    }

    /// Forget every window.
    pub fn reset(&self) {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Drop timestamps older than `cutoff`; returns what is left.
    fn prune(window: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) -> usize {
        while let Some(&front) = window.front() {
            if front <= cutoff {
                window.pop_front();
            } else {
                break;
            }
        }
        window.len()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
