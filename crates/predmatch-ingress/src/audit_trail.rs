//! Business-event audit trail.
//!
//! Appends happen after commit (or right before a rejection) and are
//! best-effort: [`AuditTrail::log`] swallows failures with a warning so a
//! broken sink never rolls back or blocks trading.

use std::sync::{Mutex, PoisonError};

use predmatch_types::{AuditAction, AuditEntry, MemberId, Result};

/// Sink for audit entries.
pub trait AuditTrail: Send + Sync {
    /// Persist one entry.
    ///
    /// # Errors
    /// Implementation-specific; callers normally go through [`Self::log`].
    fn append(&self, entry: AuditEntry) -> Result<()>;

    /// Best-effort append.
    fn log(
        &self,
        member_id: Option<MemberId>,
        action: AuditAction,
        entity_type: &str,
        entity_id: Option<String>,
        detail: &str,
    ) {
        let entry = AuditEntry::new(member_id, action, entity_type, entity_id, detail);
        if let Err(e) = self.append(entry) {
            tracing::warn!(%action, entity_type, error = %e, "Audit append failed");
        }
    }
}

/// Keeps entries in memory; used by tests and the CLI report.
#[derive(Debug, Default)]
pub struct MemoryAuditTrail {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditTrail {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn count(&self, action: AuditAction) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.action == action)
            .count()
    }
}

impl AuditTrail for MemoryAuditTrail {
    fn append(&self, entry: AuditEntry) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        Ok(())
    }
}

/// Emits every entry as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditTrail;

impl AuditTrail for TracingAuditTrail {
    fn append(&self, entry: AuditEntry) -> Result<()> {
        tracing::info!(
            target: "predmatch::audit",
            action = %entry.action,
            member = ?entry.member_id.map(|m| m.to_string()),
            entity_type = %entry.entity_type,
            entity_id = ?entry.entity_id,
            detail = %entry.detail,
            "audit"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use predmatch_types::PredmatchError;

    use super::*;

    struct BrokenSink;

    impl AuditTrail for BrokenSink {
        fn append(&self, _entry: AuditEntry) -> Result<()> {
            Err(PredmatchError::AuditAppend {
                reason: "disk full".into(),
            })
        }
    }

    #[test]
    fn memory_trail_records_entries() {
        let trail = MemoryAuditTrail::new();
        trail.log(None, AuditAction::Settle, "QUESTION", Some("q".into()), "initiated");
        trail.log(Some(MemberId::new()), AuditAction::OrderCreate, "ORDER", None, "");
        assert_eq!(trail.entries().len(), 2);
        assert_eq!(trail.count(AuditAction::Settle), 1);
    }

    #[test]
    fn log_swallows_append_errors() {
        // Must not panic or propagate.
        BrokenSink.log(None, AuditAction::Payout, "PAYOUT", None, "x");
        assert!(BrokenSink.append(AuditEntry::new(None, AuditAction::Payout, "PAYOUT", None, "x")).is_err());
    }

    #[test]
    fn tracing_trail_never_fails() {
        let entry = AuditEntry::new(None, AuditAction::RiskReject, "ORDER", None, "limit");
        assert!(TracingAuditTrail.append(entry).is_ok());
    }
}
