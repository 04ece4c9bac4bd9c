//! Two-phase settlement.
//!
//! ```text
//!  VOTING / BREAK / BETTING / CLOSED
//!        │ initiate(result, source)
//!        ▼
//!   TENTATIVE ──cancel──▶ BETTING (or CLOSED once expired)
//!        │ finalize (after the dispute window)
//!        ▼
//!    SETTLED
//! ```
//!
//! Finalization commits the SETTLED status, the settled flag on every
//! position, the cancellation of resting orders and one PENDING payout
//! record per winner in a single unit of work. Payouts are credited
//! afterwards, one unit of work per member, so a failure midway leaves
//! the rest retryable.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use predmatch_matchcore::{MatchingEngine, PositionUpdate};
use predmatch_types::{
    AuditAction, FinalResult, MemberId, PayoutKey, PayoutRecord, PredmatchError, QuestionId, QuestionStatus, Result,
    SettlementConfig, Side,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculator::{PoolSnapshot, SettlementCalculator};
use crate::chain_mirror::{MirrorDispatcher, SettlementEvent};
use crate::payout::{DistributionReport, PayoutDistributor, planned_total};

/// Upper bound for a configured dispute window.
const MAX_DISPUTE_WINDOW_DAYS: i64 = 3650;

/// Result of `initiate_settlement`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TentativeSummary {
    pub question_id: QuestionId,
    pub status: QuestionStatus,
    pub final_result: FinalResult,
    pub source_ref: Option<String>,
    pub dispute_deadline: DateTime<Utc>,
}

/// Result of `finalize_settlement`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementSummary {
    pub question_id: QuestionId,
    pub final_result: FinalResult,
    /// Positions of regular members on the question.
    pub total_bets: usize,
    pub total_winners: usize,
    /// Planned payout, whether or not every credit went through.
    pub total_payout: Decimal,
    pub failed_payouts: usize,
}

/// One settled position of a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementHistoryItem {
    pub question_id: QuestionId,
    pub question_title: String,
    pub choice: Side,
    pub final_result: FinalResult,
    /// Cost basis of the position.
    pub stake: Decimal,
    pub payout: Decimal,
    pub profit: Decimal,
    pub is_winner: bool,
}

/// Everything `finalize` committed that still needs post-commit work.
struct FinalizedPlan {
    final_result: FinalResult,
    total_bets: usize,
    records: Vec<PayoutRecord>,
    updates: Vec<PositionUpdate>,
}

pub struct SettlementEngine {
    engine: Arc<MatchingEngine>,
    calculator: SettlementCalculator,
    distributor: PayoutDistributor,
    dispute_window: Duration,
    mirror: Option<MirrorDispatcher>,
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("calculator", &self.calculator)
            .field("distributor", &self.distributor)
            .field("dispute_window", &self.dispute_window)
            .field("mirror", &self.mirror)
            .finish_non_exhaustive()
    }
}

impl SettlementEngine {
    #[must_use]
    pub fn new(engine: Arc<MatchingEngine>, config: &SettlementConfig) -> Self {
        let retry = *engine.retry_policy();
        Self {
            calculator: SettlementCalculator::new(config.fee_multiplier),
            distributor: PayoutDistributor::new(config.max_payout_attempts, retry),
            dispute_window: i64::try_from(config.dispute_window_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or_else(|| Duration::days(MAX_DISPUTE_WINDOW_DAYS)),
            mirror: None,
            engine,
        }
    }

    #[must_use]
    pub fn with_mirror(mut self, mirror: MirrorDispatcher) -> Self {
        self.mirror = Some(mirror);
        self
    }

    #[must_use]
    pub fn calculator(&self) -> &SettlementCalculator {
        &self.calculator
    }

    // =================================================================
    // Phase 1: tentative result
    // =================================================================

    pub fn initiate_settlement(
        &self,
        question_id: QuestionId,
        result: FinalResult,
        source_ref: Option<String>,
    ) -> Result<TentativeSummary> {
        self.initiate_settlement_at(question_id, result, source_ref, Utc::now())
    }

    /// Propose `result` and open the dispute window at `now`.
    ///
    /// # Errors
    /// `ResultPending`, `SettlementAlreadyFinalized`, `InvalidPhaseTransition`
    /// (already TENTATIVE), `NoPositionsToSettle`.
    pub fn initiate_settlement_at(
        &self,
        question_id: QuestionId,
        result: FinalResult,
        source_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<TentativeSummary> {
        if result == FinalResult::Pending {
            return Err(PredmatchError::ResultPending);
        }
        let summary = self.with_question_lock(question_id, || {
            let mut uow = self.engine.store().begin();
            let mut question = uow.require_question(question_id)?;
            match question.status {
                QuestionStatus::Settled => return Err(PredmatchError::SettlementAlreadyFinalized(question_id)),
                status if !status.can_initiate_settlement() => {
                    return Err(PredmatchError::InvalidPhaseTransition {
                        from: status,
                        action: "initiate settlement",
                    });
                }
                _ => {}
            }
            if uow.positions_for_question(question_id).is_empty() {
                return Err(PredmatchError::NoPositionsToSettle(question_id));
            }

            let deadline = now + self.dispute_window;
            question.status = QuestionStatus::Tentative;
            question.final_result = result;
            question.source_ref.clone_from(&source_ref);
            question.dispute_deadline = Some(deadline);
            uow.put_question(question);
            uow.commit()?;
            Ok(TentativeSummary {
                question_id,
                status: QuestionStatus::Tentative,
                final_result: result,
                source_ref: source_ref.clone(),
                dispute_deadline: deadline,
            })
        })?;

        tracing::info!(
            question = %question_id,
            %result,
            deadline = %summary.dispute_deadline,
            "Settlement initiated"
        );
        self.engine.audit().log(
            None,
            AuditAction::Settle,
            "QUESTION",
            Some(question_id.to_string()),
            &format!("tentative {result}, dispute deadline {}", summary.dispute_deadline),
        );
        Ok(summary)
    }

    pub fn cancel_tentative(&self, question_id: QuestionId) -> Result<QuestionStatus> {
        self.cancel_tentative_at(question_id, Utc::now())
    }

    /// Withdraw a tentative result. The question returns to BETTING, or to
    /// CLOSED when it has already expired.
    pub fn cancel_tentative_at(&self, question_id: QuestionId, now: DateTime<Utc>) -> Result<QuestionStatus> {
        let status = self.with_question_lock(question_id, || {
            let mut uow = self.engine.store().begin();
            let mut question = uow.require_question(question_id)?;
            if question.status != QuestionStatus::Tentative {
                return Err(PredmatchError::InvalidPhaseTransition {
                    from: question.status,
                    action: "cancel settlement",
                });
            }
            question.status = if question.is_expired(now) {
                QuestionStatus::Closed
            } else {
                QuestionStatus::Betting
            };
            question.final_result = FinalResult::Pending;
            question.source_ref = None;
            question.dispute_deadline = None;
            let status = question.status;
            uow.put_question(question);
            uow.commit()?;
            Ok(status)
        })?;

        tracing::info!(question = %question_id, %status, "Tentative settlement cancelled");
        self.engine.audit().log(
            None,
            AuditAction::SettlementCancel,
            "QUESTION",
            Some(question_id.to_string()),
            &format!("restored to {status}"),
        );
        Ok(status)
    }

    // =================================================================
    // Phase 2: finalization
    // =================================================================

    pub fn finalize_settlement(&self, question_id: QuestionId, skip_window_check: bool) -> Result<SettlementSummary> {
        self.finalize_settlement_at(question_id, skip_window_check, Utc::now())
    }

    /// Commit the result and distribute payouts.
    ///
    /// # Errors
    /// `SettlementAlreadyFinalized` on a second call, `DisputeWindowOpen`
    /// before the deadline (unless skipped), `InvalidPhaseTransition` if no
    /// settlement was initiated.
    pub fn finalize_settlement_at(
        &self,
        question_id: QuestionId,
        skip_window_check: bool,
        now: DateTime<Utc>,
    ) -> Result<SettlementSummary> {
        let plan = self.with_question_lock(question_id, || self.commit_plan(question_id, skip_window_check, now))?;

        self.engine.audit_position_updates(&plan.updates);
        let report = self.distributor.distribute(self.engine.store(), plan.records.iter().map(|r| &r.key));
        self.audit_payouts(&plan.records);

        let summary = SettlementSummary {
            question_id,
            final_result: plan.final_result,
            total_bets: plan.total_bets,
            total_winners: plan.records.len(),
            total_payout: planned_total(&plan.records),
            failed_payouts: report.failed.len(),
        };
        tracing::info!(
            question = %question_id,
            result = %summary.final_result,
            bets = summary.total_bets,
            winners = summary.total_winners,
            payout = %summary.total_payout,
            failed = summary.failed_payouts,
            "Settlement finalized"
        );
        self.engine.audit().log(
            None,
            AuditAction::Settle,
            "QUESTION",
            Some(question_id.to_string()),
            &format!(
                "final {}: {} winners, {} paid out",
                summary.final_result, summary.total_winners, summary.total_payout
            ),
        );

        if let Some(mirror) = &self.mirror {
            mirror.dispatch(SettlementEvent {
                question_id,
                final_result: summary.final_result,
                total_winners: summary.total_winners,
                total_payout: summary.total_payout,
                settled_at: now,
            });
        }
        Ok(summary)
    }

    fn commit_plan(&self, question_id: QuestionId, skip_window_check: bool, now: DateTime<Utc>) -> Result<FinalizedPlan> {
        let mut uow = self.engine.store().begin();
        let mut question = uow.require_question(question_id)?;
        match (question.status, question.dispute_deadline) {
            (QuestionStatus::Settled, _) | (QuestionStatus::Tentative, None) => {
                return Err(PredmatchError::SettlementAlreadyFinalized(question_id));
            }
            (QuestionStatus::Tentative, Some(deadline)) => {
                if !skip_window_check && now < deadline {
                    return Err(PredmatchError::DisputeWindowOpen { deadline });
                }
            }
            (status, _) => {
                return Err(PredmatchError::InvalidPhaseTransition {
                    from: status,
                    action: "finalize settlement",
                });
            }
        }
        let winning_side = question.final_result.winning_side().ok_or(PredmatchError::ResultPending)?;

        let market_maker = self.engine.market_maker();
        let bets: Vec<_> = uow
            .positions_for_question(question_id)
            .into_iter()
            .filter(|p| p.member_id != market_maker && !p.settled)
            .collect();
        let pools = PoolSnapshot::from_pools(&question.pools, winning_side, question.initial_liquidity);
        let records: Vec<PayoutRecord> = bets
            .iter()
            .filter(|p| p.side == winning_side && p.quantity > Decimal::ZERO)
            .map(|p| PayoutRecord::planned(question_id, p.member_id, p.quantity, self.calculator.payout(p.quantity, &pools)))
            .collect();
        for record in &records {
            uow.put_payout(record.clone());
        }

        let (cancelled, updates) = self.engine.cancel_resting_in(&mut uow, question_id, now)?;
        let settled = self.engine.positions().mark_settled(&mut uow, question_id);

        question.status = QuestionStatus::Settled;
        question.dispute_deadline = None;
        let final_result = question.final_result;
        uow.put_question(question);
        uow.commit()?;

        tracing::debug!(
            question = %question_id,
            cancelled_orders = cancelled,
            settled_positions = settled,
            "Settlement plan committed"
        );
        Ok(FinalizedPlan {
            final_result,
            total_bets: bets.len(),
            records,
            updates,
        })
    }

    fn audit_payouts(&self, records: &[PayoutRecord]) {
        let store = self.engine.store();
        for record in records {
            let status = store.payout(&record.key).map_or_else(|| "MISSING".to_string(), |r| r.status.to_string());
            self.engine.audit().log(
                Some(record.member_id),
                AuditAction::Payout,
                "PAYOUT",
                Some(record.key.to_string()),
                &format!("{} for stake {}: {status}", record.amount, record.stake),
            );
        }
    }

    /// Re-run FAILED or PENDING payouts that still have attempts left.
    pub fn retry_failed_payouts(&self, question_id: QuestionId) -> DistributionReport {
        let max_attempts = self.distributor.max_attempts();
        let pending: Vec<PayoutRecord> = self
            .engine
            .store()
            .payouts_for_question(question_id)
            .into_iter()
            .filter(|r| r.is_retryable(max_attempts))
            .collect();
        let report = self.distributor.distribute(self.engine.store(), pending.iter().map(|r| &r.key));
        self.audit_payouts(&pending);
        tracing::info!(
            question = %question_id,
            paid = report.paid,
            failed = report.failed.len(),
            "Payout retry finished"
        );
        report
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Settled positions of `member_id` on SETTLED questions.
    #[must_use]
    pub fn settlement_history(&self, member_id: MemberId) -> Vec<SettlementHistoryItem> {
        let store = self.engine.store();
        self.engine
            .positions()
            .positions_for_member(store, member_id)
            .into_iter()
            .filter(|p| p.settled)
            .filter_map(|position| {
                let question = store.question(position.question_id)?;
                if question.status != QuestionStatus::Settled {
                    return None;
                }
                let is_winner = question.final_result.winning_side() == Some(position.side);
                let payout = if is_winner {
                    store
                        .payout(&PayoutKey::new(question.id, member_id))
                        .filter(PayoutRecord::is_paid)
                        .map_or(Decimal::ZERO, |r| r.amount)
                } else {
                    Decimal::ZERO
                };
                let stake = position.cost_basis();
                Some(SettlementHistoryItem {
                    question_id: question.id,
                    question_title: question.title,
                    choice: position.side,
                    final_result: question.final_result,
                    stake,
                    payout,
                    profit: payout - stake,
                    is_winner,
                })
            })
            .collect()
    }

    fn with_question_lock<T>(&self, question_id: QuestionId, op: impl FnMut() -> Result<T>) -> Result<T> {
        let lock = self.engine.store().question_lock(question_id);
        self.engine.retry_policy().run_locked(&lock, op)
    }
}

#[cfg(test)]
mod tests {
    use predmatch_ingress::{MemoryAuditTrail, PauseRegistry};
    use predmatch_persistence::Store;
    use predmatch_types::{Direction, EngineConfig, OrderRequest, PayoutStatus, Question};

    use super::*;

    struct Fixture {
        engine: Arc<MatchingEngine>,
        settlement: SettlementEngine,
        question: QuestionId,
    }

    fn fixture(dispute_window_secs: u64) -> Fixture {
        let store = Arc::new(Store::new());
        let mut config = EngineConfig::default();
        config.settlement.dispute_window_secs = dispute_window_secs;
        let mut question = Question::new("Settle me", Decimal::from(500), Utc::now() + Duration::hours(1));
        question.status = QuestionStatus::Betting;
        let id = question.id;
        let mut uow = store.begin();
        uow.put_question(question);
        uow.commit().unwrap();
        let engine = Arc::new(MatchingEngine::new(
            store,
            &config,
            Arc::new(PauseRegistry::new()),
            Arc::new(MemoryAuditTrail::new()),
        ));
        let settlement = SettlementEngine::new(Arc::clone(&engine), &config.settlement);
        Fixture {
            engine,
            settlement,
            question: id,
        }
    }

    impl Fixture {
        /// YES buyer and NO buyer trade `qty` shares at 0.60 / 0.40.
        fn trade_pair(&self, qty: i64) -> (MemberId, MemberId) {
            let yes = MemberId::new();
            let no = MemberId::new();
            let store = self.engine.store();
            store.deposit(yes, Decimal::from(1000)).unwrap();
            store.deposit(no, Decimal::from(1000)).unwrap();
            self.engine
                .submit(&OrderRequest::limit(no, self.question, Side::No, Direction::Buy, Decimal::new(40, 2), Decimal::from(qty)))
                .unwrap();
            self.engine
                .submit(&OrderRequest::limit(yes, self.question, Side::Yes, Direction::Buy, Decimal::new(60, 2), Decimal::from(qty)))
                .unwrap();
            (yes, no)
        }
    }

    #[test]
    fn initiate_requires_positions_and_a_result() {
        let fx = fixture(0);
        let err = fx.settlement.initiate_settlement(fx.question, FinalResult::Yes, None).unwrap_err();
        assert!(matches!(err, PredmatchError::NoPositionsToSettle(_)));
        let err = fx.settlement.initiate_settlement(fx.question, FinalResult::Pending, None).unwrap_err();
        assert!(matches!(err, PredmatchError::ResultPending));
    }

    #[test]
    fn dispute_window_blocks_finalize_unless_skipped() {
        let fx = fixture(3600);
        fx.trade_pair(100);
        let tentative = fx
            .settlement
            .initiate_settlement(fx.question, FinalResult::Yes, Some("https://example.org/result".into()))
            .unwrap();
        assert_eq!(tentative.status, QuestionStatus::Tentative);

        let err = fx.settlement.finalize_settlement(fx.question, false).unwrap_err();
        assert!(matches!(err, PredmatchError::DisputeWindowOpen { .. }));
        let err = fx.settlement.initiate_settlement(fx.question, FinalResult::No, None).unwrap_err();
        assert!(matches!(err, PredmatchError::InvalidPhaseTransition { .. }));

        assert!(fx.settlement.finalize_settlement(fx.question, true).is_ok());
    }

    #[test]
    fn cancel_restores_betting_or_closed() {
        let fx = fixture(3600);
        fx.trade_pair(10);
        fx.settlement.initiate_settlement(fx.question, FinalResult::No, None).unwrap();
        assert_eq!(fx.settlement.cancel_tentative(fx.question).unwrap(), QuestionStatus::Betting);
        let q = fx.engine.store().question(fx.question).unwrap();
        assert_eq!(q.final_result, FinalResult::Pending);
        assert!(q.dispute_deadline.is_none());

        fx.settlement.initiate_settlement(fx.question, FinalResult::No, None).unwrap();
        let later = Utc::now() + Duration::hours(2);
        assert_eq!(fx.settlement.cancel_tentative_at(fx.question, later).unwrap(), QuestionStatus::Closed);
        assert!(fx.settlement.cancel_tentative(fx.question).is_err());
    }

    #[test]
    fn finalize_pays_winners_once() {
        let fx = fixture(0);
        let (yes, no) = fx.trade_pair(100);
        // Pools: total 1100, yes 600 -> eff_total 100, eff_winning 100, ratio 0.99.
        fx.settlement.initiate_settlement(fx.question, FinalResult::Yes, None).unwrap();
        let summary = fx.settlement.finalize_settlement(fx.question, false).unwrap();
        assert_eq!(summary.total_bets, 2);
        assert_eq!(summary.total_winners, 1);
        assert_eq!(summary.total_payout, Decimal::from(99));
        assert_eq!(summary.failed_payouts, 0);

        let store = fx.engine.store();
        assert_eq!(store.balance(yes).available, Decimal::from(1000 - 60 + 99));
        assert_eq!(store.balance(no).available, Decimal::from(960));

        let err = fx.settlement.finalize_settlement(fx.question, true).unwrap_err();
        assert!(matches!(err, PredmatchError::SettlementAlreadyFinalized(_)));
        assert_eq!(store.balance(yes).available, Decimal::from(1039));

        let history = fx.settlement.settlement_history(yes);
        assert_eq!(history.len(), 1);
        assert!(history[0].is_winner);
        assert_eq!(history[0].stake, Decimal::from(60));
        assert_eq!(history[0].profit, Decimal::from(39));
        assert!(!fx.settlement.settlement_history(no)[0].is_winner);
    }

    #[test]
    fn retry_never_pays_succeeded_records() {
        let fx = fixture(0);
        let (yes, _) = fx.trade_pair(100);
        fx.settlement.initiate_settlement(fx.question, FinalResult::Yes, None).unwrap();
        fx.settlement.finalize_settlement(fx.question, false).unwrap();
        let store = fx.engine.store();
        let before = store.balance(yes).available;

        let report = fx.settlement.retry_failed_payouts(fx.question);
        assert_eq!(report.paid, 0);
        assert!(report.failed.is_empty());
        assert_eq!(store.balance(yes).available, before);
        let record = store.payout(&PayoutKey::new(fx.question, yes)).unwrap();
        assert_eq!(record.status, PayoutStatus::Succeeded);
        assert_eq!(record.attempts, 1);
    }

    #[test]
    fn finalize_refunds_resting_orders() {
        let fx = fixture(0);
        fx.trade_pair(10);
        let idle = MemberId::new();
        fx.engine.store().deposit(idle, Decimal::from(50)).unwrap();
        fx.engine
            .submit(&OrderRequest::limit(idle, fx.question, Side::Yes, Direction::Buy, Decimal::new(20, 2), Decimal::from(50)))
            .unwrap();
        assert_eq!(fx.engine.store().balance(idle).frozen, Decimal::from(10));

        fx.settlement.initiate_settlement(fx.question, FinalResult::No, None).unwrap();
        fx.settlement.finalize_settlement(fx.question, false).unwrap();
        let bal = fx.engine.store().balance(idle);
        assert_eq!(bal.frozen, Decimal::ZERO);
        assert_eq!(bal.available, Decimal::from(50));
    }
}
