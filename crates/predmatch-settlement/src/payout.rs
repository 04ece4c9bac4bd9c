//! Member-by-member payout distribution.
//!
//! Each [`PayoutRecord`] is credited in its own unit of work keyed
//! `question:member`. A SUCCEEDED record is never credited again; a record
//! that fails is marked FAILED with its attempt count, and stays eligible
//! until it reaches the attempt budget.

use chrono::Utc;
use predmatch_persistence::{RetryPolicy, Store};
use predmatch_types::{LedgerKind, PayoutKey, PayoutRecord, PayoutStatus, PredmatchError, Result};
use rust_decimal::Decimal;

/// Tally of one distribution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionReport {
    pub paid: usize,
    pub paid_amount: Decimal,
    /// Keys that failed in this pass.
    pub failed: Vec<PayoutKey>,
    /// Already-paid or exhausted records left untouched.
    pub skipped: usize,
}

#[derive(Debug, Clone)]
pub struct PayoutDistributor {
    max_attempts: u32,
    retry: RetryPolicy,
}

impl PayoutDistributor {
    #[must_use]
    pub fn new(max_attempts: u32, retry: RetryPolicy) -> Self {
        Self { max_attempts, retry }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Credit every eligible record of `keys`.
    pub fn distribute<'k>(&self, store: &Store, keys: impl IntoIterator<Item = &'k PayoutKey>) -> DistributionReport {
        let mut report = DistributionReport::default();
        for key in keys {
            match self.pay_one(store, key) {
                Ok(Some(amount)) => {
                    report.paid += 1;
                    report.paid_amount += amount;
                }
                Ok(None) => report.skipped += 1,
                Err(err @ PredmatchError::PayoutAttemptsExhausted { .. }) => {
                    tracing::warn!(%key, error = %err, "Payout not retried");
                    report.skipped += 1;
                }
                Err(err) => {
                    tracing::error!(%key, error = %err, "Payout failed");
                    self.record_failure(store, key, &err);
                    report.failed.push(key.clone());
                }
            }
        }
        report
    }

    /// Credit one record. `Ok(None)` when there is nothing to do.
    ///
    /// # Errors
    /// `PayoutPlanMismatch` if the record no longer matches its digest,
    /// `PayoutAttemptsExhausted` if the budget is used up.
    pub fn pay_one(&self, store: &Store, key: &PayoutKey) -> Result<Option<Decimal>> {
        self.retry.run(|| {
            let mut uow = store.begin();
            let Some(mut record) = uow.payout(key) else {
                return Ok(None);
            };
            if record.is_paid() {
                return Ok(None);
            }
            if !record.is_retryable(self.max_attempts) {
                return Err(PredmatchError::PayoutAttemptsExhausted {
                    key: key.to_string(),
                    attempts: record.attempts,
                });
            }
            if !record.plan_intact() {
                return Err(PredmatchError::PayoutPlanMismatch { key: key.to_string() });
            }

            uow.credit(record.member_id, record.amount);
            uow.record_movement(
                record.member_id,
                LedgerKind::Payout,
                record.amount,
                format!("Settlement payout for question {}", record.question_id),
                Some(record.question_id),
            );
            record.attempts += 1;
            record.status = PayoutStatus::Succeeded;
            record.last_error = None;
            record.completed_at = Some(Utc::now());
            let amount = record.amount;
            uow.put_payout(record);
            uow.commit()?;
            Ok(Some(amount))
        })
    }

    /// Mark a record FAILED in its own unit of work. Best-effort.
    fn record_failure(&self, store: &Store, key: &PayoutKey, cause: &PredmatchError) {
        let outcome = self.retry.run(|| {
            let mut uow = store.begin();
            let Some(mut record) = uow.payout(key) else {
                return Ok(());
            };
            if record.is_paid() || !record.status.can_transition_to(PayoutStatus::Failed) {
                return Ok(());
            }
            record.attempts += 1;
            record.status = PayoutStatus::Failed;
            record.last_error = Some(cause.to_string());
            uow.put_payout(record);
            uow.commit()
        });
        if let Err(err) = outcome {
            tracing::warn!(%key, error = %err, "Could not record payout failure");
        }
    }
}

/// Sum of planned amounts.
#[must_use]
pub fn planned_total(records: &[PayoutRecord]) -> Decimal {
    records.iter().map(|r| r.amount).sum()
}

#[cfg(test)]
mod tests {
    use predmatch_types::{MemberId, QuestionId};

    use super::*;

    fn planned(store: &Store, amount: i64) -> PayoutRecord {
        let record = PayoutRecord::planned(QuestionId::new(), MemberId::new(), Decimal::from(10), Decimal::from(amount));
        let mut uow = store.begin();
        uow.put_payout(record.clone());
        uow.commit().unwrap();
        record
    }

    fn distributor() -> PayoutDistributor {
        PayoutDistributor::new(3, RetryPolicy::default())
    }

    #[test]
    fn pays_exactly_once() {
        let store = Store::new();
        let rec = planned(&store, 25);
        let d = distributor();

        let report = d.distribute(&store, [&rec.key]);
        assert_eq!(report.paid, 1);
        assert_eq!(report.paid_amount, Decimal::from(25));
        assert_eq!(store.balance(rec.member_id).available, Decimal::from(25));

        let again = d.distribute(&store, [&rec.key]);
        assert_eq!(again.paid, 0);
        assert_eq!(again.skipped, 1);
        assert_eq!(store.balance(rec.member_id).available, Decimal::from(25));

        let stored = store.payout(&rec.key).unwrap();
        assert_eq!(stored.status, PayoutStatus::Succeeded);
        assert_eq!(stored.attempts, 1);
        assert!(stored.completed_at.is_some());
    }

    #[test]
    fn tampered_plan_fails_then_exhausts() {
        let store = Store::new();
        let rec = planned(&store, 25);
        let mut uow = store.begin();
        let mut tampered = uow.payout(&rec.key).unwrap();
        tampered.amount = Decimal::from(2500);
        uow.put_payout(tampered);
        uow.commit().unwrap();

        let d = distributor();
        for attempt in 1..=3 {
            let report = d.distribute(&store, [&rec.key]);
            assert_eq!(report.failed.len(), 1);
            assert_eq!(store.payout(&rec.key).unwrap().attempts, attempt);
        }
        let stored = store.payout(&rec.key).unwrap();
        assert_eq!(stored.status, PayoutStatus::Failed);
        assert!(!stored.is_retryable(3));
        assert!(matches!(
            d.pay_one(&store, &rec.key),
            Err(PredmatchError::PayoutAttemptsExhausted { attempts: 3, .. })
        ));
        assert_eq!(store.balance(rec.member_id).available, Decimal::ZERO);
    }

    #[test]
    fn unknown_key_is_skipped() {
        let store = Store::new();
        let key = PayoutKey::new(QuestionId::new(), MemberId::new());
        assert_eq!(distributor().distribute(&store, [&key]).skipped, 1);
    }
}
