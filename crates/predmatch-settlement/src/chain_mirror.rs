//! On-chain mirroring of settlement results.
//!
//! The mirror is informational only: it runs after commit, is bounded by
//! a timeout, and its failures are logged and never roll anything back.
//! Dispatch needs a Tokio runtime; without one the event is dropped with a
//! debug log.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use predmatch_types::{ChainMirrorConfig, FinalResult, PredmatchError, QuestionId, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Summary of a finalized settlement as published on chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementEvent {
    pub question_id: QuestionId,
    pub final_result: FinalResult,
    pub total_winners: usize,
    pub total_payout: Decimal,
    pub settled_at: DateTime<Utc>,
}

pub type MirrorFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;

/// Publishes settlement events; returns a transaction reference if any.
pub trait ChainMirror: Send + Sync {
    fn record_settlement(&self, event: SettlementEvent) -> MirrorFuture<'_>;
}

/// Keeps published events in memory and hands out sequential references.
#[derive(Debug, Default)]
pub struct MemoryChainMirror {
    events: Mutex<Vec<SettlementEvent>>,
}

impl MemoryChainMirror {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<SettlementEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ChainMirror for MemoryChainMirror {
    fn record_settlement(&self, event: SettlementEvent) -> MirrorFuture<'_> {
        Box::pin(async move {
            let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
            events.push(event);
            Ok(Some(format!("mem-tx-{}", events.len())))
        })
    }
}

/// Timeout-bounded, fire-and-forget dispatch to a [`ChainMirror`].
#[derive(Clone)]
pub struct MirrorDispatcher {
    mirror: Arc<dyn ChainMirror>,
    timeout: Duration,
    enabled: bool,
}

impl std::fmt::Debug for MirrorDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorDispatcher")
            .field("timeout", &self.timeout)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl MirrorDispatcher {
    #[must_use]
    pub fn new(mirror: Arc<dyn ChainMirror>, config: &ChainMirrorConfig) -> Self {
        Self {
            mirror,
            timeout: Duration::from_secs(config.timeout_secs),
            enabled: config.enabled,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Publish and wait, bounded by the timeout.
    ///
    /// # Errors
    /// `ChainMirrorTimeout` or whatever the mirror reports.
    pub async fn publish(&self, event: SettlementEvent) -> Result<Option<String>> {
        match tokio::time::timeout(self.timeout, self.mirror.record_settlement(event)).await {
            Ok(result) => result,
            Err(_) => Err(PredmatchError::ChainMirrorTimeout {
                secs: self.timeout.as_secs(),
            }),
        }
    }

    /// Spawn `publish` on the current runtime and return immediately.
    pub fn dispatch(&self, event: SettlementEvent) {
        if !self.enabled {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(question = %event.question_id, "No async runtime, chain mirror skipped");
            return;
        };
        let this = self.clone();
        handle.spawn(async move {
            let question = event.question_id;
            match this.publish(event).await {
                Ok(Some(tx)) => tracing::info!(%question, %tx, "Settlement mirrored on chain"),
                Ok(None) => tracing::debug!(%question, "Chain mirror returned no reference"),
                Err(err) => tracing::warn!(%question, error = %err, "Chain mirror failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StalledMirror;

    impl ChainMirror for StalledMirror {
        fn record_settlement(&self, _event: SettlementEvent) -> MirrorFuture<'_> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            })
        }
    }

    fn event() -> SettlementEvent {
        SettlementEvent {
            question_id: QuestionId::new(),
            final_result: FinalResult::Yes,
            total_winners: 2,
            total_payout: Decimal::from(150),
            settled_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn memory_mirror_returns_reference() {
        let mirror = Arc::new(MemoryChainMirror::new());
        let dispatcher = MirrorDispatcher::new(mirror.clone(), &ChainMirrorConfig::default());
        let tx = dispatcher.publish(event()).await.unwrap();
        assert_eq!(tx.as_deref(), Some("mem-tx-1"));
        assert_eq!(mirror.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_mirror_times_out() {
        let config = ChainMirrorConfig {
            enabled: true,
            timeout_secs: 30,
        };
        let dispatcher = MirrorDispatcher::new(Arc::new(StalledMirror), &config);
        let err = dispatcher.publish(event()).await.unwrap_err();
        assert!(matches!(err, PredmatchError::ChainMirrorTimeout { secs: 30 }));
    }

    #[test]
    fn dispatch_without_runtime_is_a_no_op() {
        let mirror = Arc::new(MemoryChainMirror::new());
        let dispatcher = MirrorDispatcher::new(mirror.clone(), &ChainMirrorConfig::default());
        dispatcher.dispatch(event());
        assert!(mirror.events().is_empty());
    }
}
