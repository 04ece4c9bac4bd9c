//! Retry with linear backoff for optimistic-concurrency conflicts.
//!
//! The wrapper is generic over the operation and over the predicate that
//! decides which errors are transient, so it knows nothing about how the
//! conflict was detected.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use predmatch_types::{PredmatchError, Result, RetryConfig, constants};

/// Attempt budget and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Sleep `backoff × attempt` after each failed attempt.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_RETRY_ATTEMPTS,
            backoff: Duration::from_millis(constants::DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            backoff: Duration::from_millis(cfg.backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Retry `op` on [`PredmatchError::is_conflict`].
    pub fn run<T>(&self, op: impl FnMut() -> Result<T>) -> Result<T> {
        retry_with_backoff(self, PredmatchError::is_conflict, op)
    }

    /// [`Self::run`] with `lock` held for each attempt only. The backoff
    /// sleep runs with the lock released, so other callers on the same
    /// question are not stalled by a retrying one.
    ///
    /// # Errors
    /// As [`Self::run`]; `LockPoisoned` if the lock is poisoned.
    pub fn run_locked<T>(&self, lock: &Mutex<()>, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        self.run(|| {
            let _guard = lock.lock().map_err(|_| PredmatchError::LockPoisoned("question"))?;
            op()
        })
    }
}

/// Run `op` until it succeeds, fails with a non-transient error, or the
/// attempt budget is spent.
///
/// # Errors
/// Non-transient errors are returned as-is. A transient error on the last
/// attempt becomes `RetriesExhausted`.
pub fn retry_with_backoff<T>(
    policy: &RetryPolicy,
    is_transient: impl Fn(&PredmatchError) -> bool,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if !is_transient(&err) => return Err(err),
            Err(err) if attempt >= max_attempts => {
                tracing::warn!(attempts = attempt, error = %err, "Retries exhausted");
                return Err(PredmatchError::RetriesExhausted {
                    attempts: attempt,
                    last: err.to_string(),
                });
            }
            Err(err) => {
                tracing::debug!(attempt, error = %err, "Transient failure, retrying");
                thread::sleep(policy.backoff * attempt);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }

    fn conflict() -> PredmatchError {
        PredmatchError::ConcurrencyConflict {
            entity: "order",
            id: "o-1".into(),
        }
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = Cell::new(0);
        let out = fast(3).run(|| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 { Err(conflict()) } else { Ok(7) }
        });
        assert_eq!(out.unwrap(), 7);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let calls = Cell::new(0);
        let err = fast(3)
            .run(|| -> Result<()> {
                calls.set(calls.get() + 1);
                Err(conflict())
            })
            .unwrap_err();
        assert_eq!(calls.get(), 3);
        assert!(matches!(err, PredmatchError::RetriesExhausted { attempts: 3, .. }), "Got: {err}");
    }

    #[test]
    fn business_errors_are_not_retried() {
        let calls = Cell::new(0);
        let err = fast(3)
            .run(|| -> Result<()> {
                calls.set(calls.get() + 1);
                Err(PredmatchError::MarketPaused)
            })
            .unwrap_err();
        assert_eq!(calls.get(), 1);
        assert!(matches!(err, PredmatchError::MarketPaused));
    }

    #[test]
    fn custom_predicate() {
        let calls = Cell::new(0);
        let out = retry_with_backoff(
            &fast(2),
            |e| matches!(e, PredmatchError::ChainMirrorTimeout { .. }),
            || {
                calls.set(calls.get() + 1);
                if calls.get() == 1 {
                    Err(PredmatchError::ChainMirrorTimeout { secs: 30 })
                } else {
                    Ok("tx")
                }
            },
        );
        assert_eq!(out.unwrap(), "tx");
    }

    #[test]
    fn lock_is_released_during_backoff() {
        let lock = Mutex::new(());
        let barrier = Barrier::new(2);
        let taken_meanwhile = AtomicBool::new(false);
        let policy = RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(200),
        };

        let out = thread::scope(|s| {
            s.spawn(|| {
                barrier.wait();
                let _guard = lock.lock().unwrap();
                taken_meanwhile.store(true, Ordering::SeqCst);
            });
            let calls = Cell::new(0);
            policy.run_locked(&lock, || {
                calls.set(calls.get() + 1);
                if calls.get() == 1 {
                    // The other thread now blocks on the lock we hold.
                    barrier.wait();
                    Err(conflict())
                } else {
                    Ok(taken_meanwhile.load(Ordering::SeqCst))
                }
            })
        });
        assert!(out.unwrap(), "second attempt must see the lock was taken during backoff");
    }

    #[test]
    fn policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy, RetryPolicy::default());
        assert_eq!(policy.backoff, Duration::from_millis(50));
    }
}
