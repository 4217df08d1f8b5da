use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use storage::models::{
    ActivityDomain, ImpactScore, Leaderboard, LeaderboardKey, ParticipantProfile,
};
use storage::repository::ScoreRepository;
use uuid::Uuid;

use crate::calculator::ScoreCalculator;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::sources::ActivitySources;

mod assembly;
mod health;
mod locks;
mod queries;
mod reconciliation;

pub use health::{HealthReport, HealthStatus};
pub use locks::LeaderboardLocks;
pub use reconciliation::{CancelToken, ReconcileReport, Reconciler};

/// Phase of a single update trigger: Idle → Recomputing → Propagating → Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePhase {
    Idle,
    Recomputing,
    Propagating,
}

/// Outcome of [`RankingEngine::trigger_update`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerReport {
    pub participant_id: Uuid,
    /// `Idle` once every phase ran; otherwise the phase that was cut short.
    pub phase: EnginePhase,
    pub total: f64,
    pub global_rank: Option<i64>,
    pub period_rank: Option<i64>,
    pub eligible: bool,
    pub boards_updated: usize,
    pub boards_removed: usize,
    pub boards_failed: usize,
}

struct EngineInner {
    repo: Arc<dyn ScoreRepository>,
    calculator: ScoreCalculator,
    config: Arc<EngineConfig>,
    locks: LeaderboardLocks,
    reconciling: AtomicBool,
}

/// Orchestrates recomputation, ranking and leaderboard propagation.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Clone)]
pub struct RankingEngine {
    inner: Arc<EngineInner>,
}

impl RankingEngine {
    pub fn new(
        repo: Arc<dyn ScoreRepository>,
        sources: ActivitySources,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let calculator = ScoreCalculator::new(repo.clone(), sources, config.clone());

        Ok(Self {
            inner: Arc::new(EngineInner {
                repo,
                calculator,
                config,
                locks: LeaderboardLocks::new(),
                reconciling: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn calculator(&self) -> &ScoreCalculator {
        &self.inner.calculator
    }

    pub(crate) fn repo(&self) -> &dyn ScoreRepository {
        self.inner.repo.as_ref()
    }

    /// Fire-and-forget entry point for upstream activity notifications.
    pub fn on_activity_event(
        &self,
        participant_id: Uuid,
        domain: ActivityDomain,
        context: serde_json::Value,
    ) -> tokio::task::JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            match engine.trigger_update(participant_id, domain, &context).await {
                Ok(report) => tracing::debug!(
                    %participant_id,
                    boards_updated = report.boards_updated,
                    boards_failed = report.boards_failed,
                    "Activity event processed"
                ),
                Err(e) => {
                    let retryable = e.is_retryable();
                    match e.into_unsaved_score() {
                        Some(score) if retryable => engine.retry_persist(score).await,
                        _ => tracing::error!(%participant_id, "Activity event dropped"),
                    }
                }
            }
        })
    }

    async fn retry_persist(&self, score: ImpactScore) {
        let participant_id = score.participant_id;
        match self.inner.calculator.persist(&score).await {
            Ok(()) => tracing::info!(%participant_id, "Persisted score on retry"),
            Err(e) => tracing::error!(%participant_id, "Retry failed, score left for reconciliation: {}", e),
        }
    }

    /// Recomputes one participant, refreshes their ranks and propagates the
    /// new score to every stored leaderboard.
    ///
    /// Only a failed score write is returned as an error; later steps are
    /// best effort and never roll back earlier ones.
    pub async fn trigger_update(
        &self,
        participant_id: Uuid,
        domain: ActivityDomain,
        context: &serde_json::Value,
    ) -> Result<TriggerReport> {
        tracing::info!(%participant_id, %domain, "Update triggered");
        if !context.is_null() {
            tracing::debug!(%participant_id, %context, "Trigger context");
        }
        self.run_update(participant_id, true).await
    }

    /// Forced recompute and propagation without recording new activity.
    pub async fn recompute_participant(&self, participant_id: Uuid) -> Result<TriggerReport> {
        tracing::info!(%participant_id, "Recompute requested");
        self.run_update(participant_id, false).await
    }

    async fn run_update(&self, participant_id: Uuid, is_activity: bool) -> Result<TriggerReport> {
        let now = Utc::now();

        tracing::debug!(%participant_id, phase = ?EnginePhase::Recomputing, "Entering phase");
        let mut score = if is_activity {
            self.inner
                .calculator
                .calculate_for_activity(participant_id, now)
                .await?
        } else {
            self.inner.calculator.calculate(participant_id, true).await?.score
        };

        self.refresh_ranks(&mut score, now).await;
        score.append_history_sample(
            score.total(),
            score.global_rank,
            self.inner.config.rank_period,
            now,
        );
        self.inner.calculator.persist(&score).await?;

        let mut report = TriggerReport {
            participant_id,
            phase: EnginePhase::Recomputing,
            total: score.total(),
            global_rank: score.global_rank,
            period_rank: score.period_rank,
            eligible: false,
            boards_updated: 0,
            boards_removed: 0,
            boards_failed: 0,
        };

        tracing::debug!(%participant_id, phase = ?EnginePhase::Propagating, "Entering phase");
        report.phase = EnginePhase::Propagating;
        let profile = match self.inner.repo.get_participant(participant_id).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(%participant_id, "Skipping propagation, eligibility unknown: {}", e);
                report.boards_failed = LeaderboardKey::all().count();
                return Ok(report);
            }
        };

        self.propagate(&score, profile.as_ref(), now, &mut report)
            .await;
        report.phase = EnginePhase::Idle;

        tracing::info!(
            %participant_id,
            total = report.total,
            global_rank = ?report.global_rank,
            boards_updated = report.boards_updated,
            boards_removed = report.boards_removed,
            boards_failed = report.boards_failed,
            "Update complete"
        );
        Ok(report)
    }

    /// Global rank is the count of strictly greater totals plus one; the
    /// period rank does the same over the active-period population.
    async fn refresh_ranks(&self, score: &mut ImpactScore, now: DateTime<Utc>) {
        let participant_id = score.participant_id;
        let period = self.inner.config.rank_period;
        let total = score.total();

        match self
            .inner
            .repo
            .count_with_score_greater_than(total, None)
            .await
        {
            Ok(greater) => score.global_rank = Some(greater + 1),
            Err(e) => tracing::warn!(%participant_id, "Global rank not refreshed: {}", e),
        }

        if !score.is_active_in(period, now) {
            score.period_rank = None;
            return;
        }
        match self
            .inner
            .repo
            .count_with_score_greater_than(total, period.window_start(now))
            .await
        {
            Ok(greater) => score.period_rank = Some(greater + 1),
            Err(e) => tracing::warn!(%participant_id, "Period rank not refreshed: {}", e),
        }
    }

    /// Upserts the participant into every stored board they are eligible for
    /// and removes them from every other one. Absent boards are left for the
    /// lazy build on first read.
    async fn propagate(
        &self,
        score: &ImpactScore,
        profile: Option<&ParticipantProfile>,
        now: DateTime<Utc>,
        report: &mut TriggerReport,
    ) {
        let eligible = assembly::is_eligible(profile);
        report.eligible = eligible;

        for key in LeaderboardKey::all() {
            let outcome = if eligible && score.is_active_in(key.period, now) {
                self.upsert_into(key, score).await.map(|updated| {
                    if updated {
                        report.boards_updated += 1;
                    }
                })
            } else {
                self.remove_from(key, score.participant_id)
                    .await
                    .map(|removed| {
                        if removed {
                            report.boards_removed += 1;
                        }
                    })
            };

            if let Err(e) = outcome {
                report.boards_failed += 1;
                tracing::warn!(
                    participant_id = %score.participant_id,
                    leaderboard = %key,
                    "Leaderboard propagation failed: {}",
                    e
                );
            }
        }
    }

    /// Eligibility is re-read under the key's lock so a concurrent opt-out
    /// cannot be undone by an upsert that started before it.
    async fn upsert_into(&self, key: LeaderboardKey, score: &ImpactScore) -> Result<bool> {
        let _guard = self.inner.locks.acquire(key).await;

        let Some(mut board) = self.inner.repo.get_leaderboard(key.category, key.period).await?
        else {
            return Ok(false);
        };

        let profile = self.inner.repo.get_participant(score.participant_id).await?;
        if !assembly::is_eligible(profile.as_ref()) {
            if board.remove(score.participant_id) {
                self.inner.repo.upsert_leaderboard(&board).await?;
            }
            return Ok(false);
        }

        let entry = assembly::entry_for_score(score, key.category, profile.as_ref());
        board.upsert_entry(entry, Some(self.inner.config.leaderboard_size))?;
        self.inner.repo.upsert_leaderboard(&board).await?;
        Ok(true)
    }

    async fn remove_from(&self, key: LeaderboardKey, participant_id: Uuid) -> Result<bool> {
        let _guard = self.inner.locks.acquire(key).await;
        Ok(self
            .inner
            .repo
            .remove_participant(key.category, key.period, participant_id)
            .await?)
    }

    /// Full rebuild from the authoritative scores. Caller must hold the key's lock.
    async fn rebuild_locked(&self, key: LeaderboardKey) -> Result<Leaderboard> {
        let records = self
            .inner
            .repo
            .top_n_by_category(key.category, key.period, self.inner.config.leaderboard_size)
            .await?;

        let entries = assembly::eligible_entries(&records);
        let board = Leaderboard::rebuild(key, entries, Utc::now()).map_err(EngineError::from)?;
        self.inner.repo.upsert_leaderboard(&board).await?;

        tracing::debug!(leaderboard = %key, entries = board.len(), "Leaderboard rebuilt");
        Ok(board)
    }

    pub async fn rebuild_leaderboard(&self, key: LeaderboardKey) -> Result<Leaderboard> {
        let _guard = self.inner.locks.acquire(key).await;
        self.rebuild_locked(key).await
    }

    /// Stored board, or a freshly built one if none exists yet or the stored
    /// one was cleared by a reset.
    pub(crate) async fn load_or_build(&self, key: LeaderboardKey) -> Result<Leaderboard> {
        if let Some(board) = self
            .inner
            .repo
            .get_leaderboard(key.category, key.period)
            .await?
            && board.last_refreshed.is_some()
        {
            return Ok(board);
        }

        let _guard = self.inner.locks.acquire(key).await;
        match self
            .inner
            .repo
            .get_leaderboard(key.category, key.period)
            .await?
        {
            Some(board) if board.last_refreshed.is_some() => Ok(board),
            _ => self.rebuild_locked(key).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FlakyRepository, StubSources, donation_ledger, engine_over, engine_with, profile,
    };
    use storage::models::{LeaderboardCategory, LeaderboardPeriod};
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn test_trigger_update_ranks_and_records_history() {
        let stub = StubSources::default();
        let (engine, _repo) = engine_with(stub.clone());
        let low = Uuid::new_v4();
        let high = Uuid::new_v4();
        stub.set_participant_contributions(low, donation_ledger(&[10.0]));
        stub.set_participant_contributions(high, donation_ledger(&[5000.0]));

        engine
            .trigger_update(low, ActivityDomain::Donation, &serde_json::Value::Null)
            .await
            .unwrap();
        let report = engine
            .trigger_update(high, ActivityDomain::Donation, &serde_json::Value::Null)
            .await
            .unwrap();

        assert_eq!(report.global_rank, Some(1));
        assert_eq!(report.period_rank, Some(1));
        assert_eq!(report.phase, EnginePhase::Idle);
        assert!(report.eligible);

        let score = engine.repo().get_score(high).await.unwrap().unwrap();
        assert_eq!(score.history.len(), 1);
        assert_eq!(score.history.latest().and_then(|s| s.rank), Some(1));
        assert!(score.last_activity_at.is_some());
    }

    #[tokio::test]
    async fn test_trigger_update_patches_existing_boards() {
        let stub = StubSources::default();
        let (engine, _repo) = engine_with(stub.clone());
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        stub.set_participant_contributions(first, donation_ledger(&[100.0]));
        stub.set_participant_contributions(second, donation_ledger(&[9000.0]));

        engine
            .trigger_update(first, ActivityDomain::Donation, &serde_json::Value::Null)
            .await
            .unwrap();
        let key = LeaderboardKey::new(LeaderboardCategory::Overall, LeaderboardPeriod::Weekly);
        let board = engine.load_or_build(key).await.unwrap();
        assert_eq!(board.len(), 1);

        let report = engine
            .trigger_update(second, ActivityDomain::Donation, &serde_json::Value::Null)
            .await
            .unwrap();
        assert_eq!(report.boards_updated, 1);

        let board = engine.load_or_build(key).await.unwrap();
        let order: Vec<Uuid> = board.entries().iter().map(|e| e.participant_id).collect();
        assert_eq!(order, vec![second, first]);
        assert_eq!(board.entries()[1].rank, 2);
    }

    #[tokio::test]
    async fn test_opted_out_participant_is_removed_on_propagation() {
        let stub = StubSources::default().with_contributions(donation_ledger(&[300.0]));
        let (engine, repo) = engine_with(stub);
        let id = Uuid::new_v4();

        engine
            .trigger_update(id, ActivityDomain::Donation, &serde_json::Value::Null)
            .await
            .unwrap();
        let key = LeaderboardKey::new(LeaderboardCategory::Donation, LeaderboardPeriod::AllTime);
        assert_eq!(engine.load_or_build(key).await.unwrap().len(), 1);

        repo.insert_participant(profile(id, "Quiet", false)).await;
        let report = engine
            .trigger_update(id, ActivityDomain::Social, &serde_json::Value::Null)
            .await
            .unwrap();

        assert!(!report.eligible);
        assert_eq!(report.boards_removed, 1);
        assert!(engine.load_or_build(key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_driven_upserts_respect_board_size() {
        let stub = StubSources::default();
        let repo = InMemoryRepository::new();
        let config = EngineConfig {
            leaderboard_size: 2,
            ..EngineConfig::default()
        };
        let engine =
            RankingEngine::new(Arc::new(repo), stub.clone().into_sources(), config).unwrap();
        let key = LeaderboardKey::new(LeaderboardCategory::Overall, LeaderboardPeriod::AllTime);
        engine.load_or_build(key).await.unwrap();

        for amount in [10.0, 100.0, 1000.0] {
            let id = Uuid::new_v4();
            stub.set_participant_contributions(id, donation_ledger(&[amount]));
            engine
                .trigger_update(id, ActivityDomain::Donation, &serde_json::Value::Null)
                .await
                .unwrap();
        }

        let board = engine.load_or_build(key).await.unwrap();
        assert_eq!(board.len(), 2);
        let ranks: Vec<i64> = board.entries().iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_on_activity_event_runs_in_background() {
        let stub = StubSources::default().with_contributions(donation_ledger(&[42.0]));
        let (engine, repo) = engine_with(stub);
        let id = Uuid::new_v4();

        engine
            .on_activity_event(id, ActivityDomain::Donation, serde_json::json!({"gift": 42}))
            .await
            .unwrap();

        assert!(repo.get_score(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_score_write_returns_unsaved_score() {
        let stub = StubSources::default().with_contributions(donation_ledger(&[250.0]));
        let inner = InMemoryRepository::new();
        let flaky = FlakyRepository::failing_score_writes(inner.clone(), 1);
        let engine = engine_over(Arc::new(flaky), stub);
        let id = Uuid::new_v4();

        let err = engine
            .trigger_update(id, ActivityDomain::Donation, &serde_json::Value::Null)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Persistence { .. }));
        assert!(err.is_retryable());
        let unsaved = err.into_unsaved_score().unwrap();
        assert_eq!(unsaved.participant_id, id);
        assert!(unsaved.total() > 0.0);
        assert!(inner.get_score(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activity_event_retries_failed_write_once() {
        let stub = StubSources::default().with_contributions(donation_ledger(&[80.0]));
        let inner = InMemoryRepository::new();
        let flaky = FlakyRepository::failing_score_writes(inner.clone(), 1);
        let engine = engine_over(Arc::new(flaky.clone()), stub);
        let id = Uuid::new_v4();

        engine
            .on_activity_event(id, ActivityDomain::Donation, serde_json::Value::Null)
            .await
            .unwrap();

        assert_eq!(flaky.remaining_failures(), 0);
        let stored = inner.get_score(id).await.unwrap().unwrap();
        assert_eq!(stored.participant_id, id);
    }

    #[tokio::test]
    async fn test_activity_event_gives_up_after_second_failed_write() {
        let stub = StubSources::default().with_contributions(donation_ledger(&[80.0]));
        let inner = InMemoryRepository::new();
        let flaky = FlakyRepository::failing_score_writes(inner.clone(), 2);
        let engine = engine_over(Arc::new(flaky.clone()), stub);
        let id = Uuid::new_v4();

        engine
            .on_activity_event(id, ActivityDomain::Donation, serde_json::Value::Null)
            .await
            .unwrap();

        assert_eq!(flaky.remaining_failures(), 0);
        assert!(inner.get_score(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_rechecks_eligibility_under_lock() {
        let stub = StubSources::default().with_contributions(donation_ledger(&[600.0]));
        let (engine, repo) = engine_with(stub);
        let id = Uuid::new_v4();

        engine
            .trigger_update(id, ActivityDomain::Donation, &serde_json::Value::Null)
            .await
            .unwrap();
        let key = LeaderboardKey::new(LeaderboardCategory::Overall, LeaderboardPeriod::AllTime);
        assert_eq!(engine.load_or_build(key).await.unwrap().len(), 1);
        let score = repo.get_score(id).await.unwrap().unwrap();

        // Opt-out lands between the caller's eligibility check and the upsert.
        repo.insert_participant(profile(id, "Late", false)).await;
        let updated = engine.upsert_into(key, &score).await.unwrap();

        assert!(!updated);
        let board = repo
            .get_leaderboard(key.category, key.period)
            .await
            .unwrap()
            .unwrap();
        assert!(board.entries().iter().all(|e| e.participant_id != id));
    }
}
