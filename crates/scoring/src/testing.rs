//! Configurable in-process activity sources for tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use storage::error::{Result as StorageResult, StorageError};
use storage::models::{
    ImpactScore, Leaderboard, LeaderboardCategory, LeaderboardKey, LeaderboardPeriod,
    ParticipantProfile,
};
use storage::repository::{InMemoryRepository, RankedRecord, ScoreRepository};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::RankingEngine;
use crate::error::UpstreamError;
use crate::sources::{
    AchievementProgress, ActivitySources, Contribution, ContributionSource, GameSession,
    GameplaySource, SocialActivity, SocialSource, UpstreamResult,
};

#[derive(Default)]
struct StubState {
    sessions: Vec<GameSession>,
    achievements: AchievementProgress,
    social: SocialActivity,
    interactions: u32,
    contributions: Vec<Contribution>,
    contributions_by_participant: HashMap<Uuid, Vec<Contribution>>,
    friends: HashMap<Uuid, Vec<Uuid>>,
    fail_gameplay: bool,
    social_delay: Option<std::time::Duration>,
}

#[derive(Clone, Default)]
pub(crate) struct StubSources {
    state: Arc<Mutex<StubState>>,
}

impl StubSources {
    fn update(&self, f: impl FnOnce(&mut StubState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn with_sessions(self, sessions: Vec<GameSession>) -> Self {
        self.update(|s| s.sessions = sessions);
        self
    }

    pub fn with_contributions(self, ledger: Vec<Contribution>) -> Self {
        self.set_contributions(ledger);
        self
    }

    pub fn failing_gameplay(self) -> Self {
        self.update(|s| s.fail_gameplay = true);
        self
    }

    pub fn slow_social(self, delay: std::time::Duration) -> Self {
        self.update(|s| s.social_delay = Some(delay));
        self
    }

    pub fn set_contributions(&self, ledger: Vec<Contribution>) {
        self.update(|s| s.contributions = ledger);
    }

    pub fn set_participant_contributions(&self, participant_id: Uuid, ledger: Vec<Contribution>) {
        self.update(|s| {
            s.contributions_by_participant.insert(participant_id, ledger);
        });
    }

    pub fn set_friends(&self, participant_id: Uuid, friends: Vec<Uuid>) {
        self.update(|s| {
            s.friends.insert(participant_id, friends);
        });
    }

    pub fn into_sources(self) -> ActivitySources {
        ActivitySources::from_shared(Arc::new(self))
    }

    async fn social_delay(&self) {
        let delay = self.state.lock().unwrap().social_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl GameplaySource for StubSources {
    async fn sessions(
        &self,
        _participant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> UpstreamResult<Vec<GameSession>> {
        let state = self.state.lock().unwrap();
        if state.fail_gameplay {
            return Err(UpstreamError::unavailable("gameplay", "stub failure"));
        }
        Ok(state
            .sessions
            .iter()
            .filter(|s| s.started_at >= from && s.started_at <= to)
            .cloned()
            .collect())
    }

    async fn achievements(&self, _participant_id: Uuid) -> UpstreamResult<AchievementProgress> {
        let state = self.state.lock().unwrap();
        if state.fail_gameplay {
            return Err(UpstreamError::unavailable("gameplay", "stub failure"));
        }
        Ok(state.achievements)
    }
}

#[async_trait]
impl SocialSource for StubSources {
    async fn social_activity(
        &self,
        _participant_id: Uuid,
        _since: DateTime<Utc>,
    ) -> UpstreamResult<SocialActivity> {
        self.social_delay().await;
        Ok(self.state.lock().unwrap().social)
    }

    async fn interaction_count(
        &self,
        _participant_id: Uuid,
        _since: DateTime<Utc>,
    ) -> UpstreamResult<u32> {
        self.social_delay().await;
        Ok(self.state.lock().unwrap().interactions)
    }

    async fn friend_ids(&self, participant_id: Uuid) -> UpstreamResult<Vec<Uuid>> {
        let state = self.state.lock().unwrap();
        Ok(state.friends.get(&participant_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ContributionSource for StubSources {
    async fn contributions(&self, participant_id: Uuid) -> UpstreamResult<Vec<Contribution>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .contributions_by_participant
            .get(&participant_id)
            .unwrap_or(&state.contributions)
            .clone())
    }
}

/// One session per entry, `days_ago` days before `now`.
pub(crate) fn sessions_on_days(now: DateTime<Utc>, days_ago: &[i64]) -> Vec<GameSession> {
    days_ago
        .iter()
        .map(|&d| GameSession {
            game_id: "game-a".to_string(),
            started_at: now - Duration::days(d),
            duration_minutes: 45,
            tournament: false,
        })
        .collect()
}

/// Recent contributions to a single cause.
pub(crate) fn donation_ledger(amounts: &[f64]) -> Vec<Contribution> {
    let made_at = Utc::now() - Duration::hours(1);
    amounts
        .iter()
        .map(|&amount| Contribution {
            amount,
            cause: "general".to_string(),
            made_at,
            special_event: false,
        })
        .collect()
}

pub(crate) fn profile(participant_id: Uuid, name: &str, participating: bool) -> ParticipantProfile {
    ParticipantProfile {
        participant_id,
        display_name: name.to_string(),
        avatar_url: None,
        level: Some(3),
        country: None,
        leaderboard_participation: participating,
    }
}

pub(crate) fn engine_with(stub: StubSources) -> (RankingEngine, InMemoryRepository) {
    let repo = InMemoryRepository::new();
    let engine = engine_over(Arc::new(repo.clone()), stub);
    (engine, repo)
}

pub(crate) fn engine_over(repo: Arc<dyn ScoreRepository>, stub: StubSources) -> RankingEngine {
    RankingEngine::new(repo, stub.into_sources(), EngineConfig::default()).unwrap()
}

/// In-memory repository whose score writes fail a set number of times.
#[derive(Clone)]
pub(crate) struct FlakyRepository {
    inner: InMemoryRepository,
    score_write_failures: Arc<AtomicUsize>,
}

impl FlakyRepository {
    pub fn failing_score_writes(inner: InMemoryRepository, failures: usize) -> Self {
        Self {
            inner,
            score_write_failures: Arc::new(AtomicUsize::new(failures)),
        }
    }

    pub fn remaining_failures(&self) -> usize {
        self.score_write_failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScoreRepository for FlakyRepository {
    async fn get_score(&self, participant_id: Uuid) -> StorageResult<Option<ImpactScore>> {
        self.inner.get_score(participant_id).await
    }

    async fn get_scores(&self, participant_ids: &[Uuid]) -> StorageResult<Vec<ImpactScore>> {
        self.inner.get_scores(participant_ids).await
    }

    async fn upsert_score(&self, score: &ImpactScore) -> StorageResult<bool> {
        let failed = self
            .score_write_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StorageError::ConstraintViolation(
                "impact_scores write rejected".to_string(),
            ));
        }
        self.inner.upsert_score(score).await
    }

    async fn delete_score(&self, participant_id: Uuid) -> StorageResult<bool> {
        self.inner.delete_score(participant_id).await
    }

    async fn count_with_score_greater_than(
        &self,
        threshold: f64,
        active_since: Option<DateTime<Utc>>,
    ) -> StorageResult<i64> {
        self.inner
            .count_with_score_greater_than(threshold, active_since)
            .await
    }

    async fn recompute_all_ranks(&self, active_since: Option<DateTime<Utc>>) -> StorageResult<u64> {
        self.inner.recompute_all_ranks(active_since).await
    }

    async fn count_scores(&self) -> StorageResult<i64> {
        self.inner.count_scores().await
    }

    async fn count_stale_scores(&self, threshold_seconds: i64) -> StorageResult<i64> {
        self.inner.count_stale_scores(threshold_seconds).await
    }

    async fn top_n_by_category(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
        n: usize,
    ) -> StorageResult<Vec<RankedRecord>> {
        self.inner.top_n_by_category(category, period, n).await
    }

    async fn get_participant(
        &self,
        participant_id: Uuid,
    ) -> StorageResult<Option<ParticipantProfile>> {
        self.inner.get_participant(participant_id).await
    }

    async fn get_participants(
        &self,
        participant_ids: &[Uuid],
    ) -> StorageResult<Vec<ParticipantProfile>> {
        self.inner.get_participants(participant_ids).await
    }

    async fn set_leaderboard_participation(
        &self,
        participant_id: Uuid,
        enabled: bool,
    ) -> StorageResult<ParticipantProfile> {
        self.inner
            .set_leaderboard_participation(participant_id, enabled)
            .await
    }

    async fn get_leaderboard(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
    ) -> StorageResult<Option<Leaderboard>> {
        self.inner.get_leaderboard(category, period).await
    }

    async fn upsert_leaderboard(&self, leaderboard: &Leaderboard) -> StorageResult<bool> {
        self.inner.upsert_leaderboard(leaderboard).await
    }

    async fn list_stale_leaderboards(
        &self,
        threshold_seconds: i64,
    ) -> StorageResult<Vec<LeaderboardKey>> {
        self.inner.list_stale_leaderboards(threshold_seconds).await
    }

    async fn count_leaderboards(&self) -> StorageResult<i64> {
        self.inner.count_leaderboards().await
    }

    async fn remove_participant(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
        participant_id: Uuid,
    ) -> StorageResult<bool> {
        self.inner
            .remove_participant(category, period, participant_id)
            .await
    }
}
