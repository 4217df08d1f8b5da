use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RankedRecord, ScoreRepository};
use crate::error::Result;
use crate::models::{
    ImpactScore, Leaderboard, LeaderboardCategory, LeaderboardKey, LeaderboardPeriod,
    ParticipantProfile,
};

/// Process-local repository, used by tests and single-node development runs.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    scores: Arc<RwLock<HashMap<Uuid, ImpactScore>>>,
    participants: Arc<RwLock<HashMap<Uuid, ParticipantProfile>>>,
    leaderboards: Arc<RwLock<HashMap<LeaderboardKey, Leaderboard>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_participant(&self, profile: ParticipantProfile) {
        self.participants
            .write()
            .await
            .insert(profile.participant_id, profile);
    }
}

/// Number of values in a descending-sorted slice strictly greater than `threshold`.
fn count_greater(sorted_desc: &[f64], threshold: f64) -> i64 {
    sorted_desc.partition_point(|&v| v > threshold) as i64
}

#[async_trait]
impl ScoreRepository for InMemoryRepository {
    async fn get_score(&self, participant_id: Uuid) -> Result<Option<ImpactScore>> {
        Ok(self.scores.read().await.get(&participant_id).cloned())
    }

    async fn get_scores(&self, participant_ids: &[Uuid]) -> Result<Vec<ImpactScore>> {
        let scores = self.scores.read().await;
        Ok(participant_ids
            .iter()
            .filter_map(|id| scores.get(id).cloned())
            .collect())
    }

    async fn upsert_score(&self, score: &ImpactScore) -> Result<bool> {
        self.scores
            .write()
            .await
            .insert(score.participant_id, score.clone());
        Ok(true)
    }

    async fn delete_score(&self, participant_id: Uuid) -> Result<bool> {
        Ok(self.scores.write().await.remove(&participant_id).is_some())
    }

    async fn count_with_score_greater_than(
        &self,
        threshold: f64,
        active_since: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        let scores = self.scores.read().await;
        let count = scores
            .values()
            .filter(|s| s.total() > threshold)
            .filter(|s| match active_since {
                Some(start) => s.last_activity_at.is_some_and(|at| at >= start),
                None => true,
            })
            .count();
        Ok(count as i64)
    }

    async fn recompute_all_ranks(&self, active_since: Option<DateTime<Utc>>) -> Result<u64> {
        let mut scores = self.scores.write().await;

        let is_active = |s: &ImpactScore| match active_since {
            Some(start) => s.last_activity_at.is_some_and(|at| at >= start),
            None => true,
        };

        let mut totals: Vec<f64> = scores.values().map(ImpactScore::total).collect();
        totals.sort_by(|a, b| b.total_cmp(a));
        let mut period_totals: Vec<f64> = scores
            .values()
            .filter(|&s| is_active(s))
            .map(ImpactScore::total)
            .collect();
        period_totals.sort_by(|a, b| b.total_cmp(a));

        for score in scores.values_mut() {
            let total = score.total();
            let active = is_active(&*score);
            score.global_rank = Some(count_greater(&totals, total) + 1);
            score.period_rank = active.then(|| count_greater(&period_totals, total) + 1);
        }

        Ok(scores.len() as u64)
    }

    async fn count_scores(&self) -> Result<i64> {
        Ok(self.scores.read().await.len() as i64)
    }

    async fn count_stale_scores(&self, threshold_seconds: i64) -> Result<i64> {
        let now = Utc::now();
        let scores = self.scores.read().await;
        Ok(scores
            .values()
            .filter(|s| s.is_stale(threshold_seconds, now))
            .count() as i64)
    }

    async fn top_n_by_category(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
        n: usize,
    ) -> Result<Vec<RankedRecord>> {
        let now = Utc::now();
        let scores = self.scores.read().await;
        let participants = self.participants.read().await;

        let mut records: Vec<RankedRecord> = scores
            .values()
            .filter(|s| s.is_active_in(period, now))
            .map(|s| RankedRecord {
                participant_id: s.participant_id,
                score: s.score_for(category),
                total: s.total(),
                components: s.components(),
                profile: participants.get(&s.participant_id).cloned(),
            })
            .collect();

        records.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.participant_id.cmp(&b.participant_id))
        });
        records.truncate(n);

        Ok(records)
    }

    async fn get_participant(&self, participant_id: Uuid) -> Result<Option<ParticipantProfile>> {
        Ok(self.participants.read().await.get(&participant_id).cloned())
    }

    async fn get_participants(&self, participant_ids: &[Uuid]) -> Result<Vec<ParticipantProfile>> {
        let participants = self.participants.read().await;
        Ok(participant_ids
            .iter()
            .filter_map(|id| participants.get(id).cloned())
            .collect())
    }

    async fn set_leaderboard_participation(
        &self,
        participant_id: Uuid,
        enabled: bool,
    ) -> Result<ParticipantProfile> {
        let mut participants = self.participants.write().await;
        let profile = participants
            .entry(participant_id)
            .or_insert_with(|| ParticipantProfile::placeholder(participant_id));
        profile.leaderboard_participation = enabled;
        Ok(profile.clone())
    }

    async fn get_leaderboard(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
    ) -> Result<Option<Leaderboard>> {
        let key = LeaderboardKey::new(category, period);
        Ok(self.leaderboards.read().await.get(&key).cloned())
    }

    async fn upsert_leaderboard(&self, leaderboard: &Leaderboard) -> Result<bool> {
        self.leaderboards
            .write()
            .await
            .insert(leaderboard.key(), leaderboard.clone());
        Ok(true)
    }

    async fn list_stale_leaderboards(&self, threshold_seconds: i64) -> Result<Vec<LeaderboardKey>> {
        let now = Utc::now();
        let boards = self.leaderboards.read().await;
        let mut keys: Vec<LeaderboardKey> = boards
            .values()
            .filter(|b| b.is_stale(threshold_seconds, now))
            .map(Leaderboard::key)
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn count_leaderboards(&self) -> Result<i64> {
        Ok(self.leaderboards.read().await.len() as i64)
    }

    async fn remove_participant(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
        participant_id: Uuid,
    ) -> Result<bool> {
        let key = LeaderboardKey::new(category, period);
        let mut boards = self.leaderboards.write().await;
        Ok(boards
            .get_mut(&key)
            .is_some_and(|board| board.remove(participant_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComponentDetail, ComponentKind, ScoreModel};

    fn score_with_total(donation: f64, active: bool) -> ImpactScore {
        let now = Utc::now();
        let mut score = ImpactScore::new(Uuid::new_v4(), 10, now);
        score
            .set_component(
                &ScoreModel::default(),
                ComponentKind::Donation,
                donation,
                ComponentDetail::default(),
            )
            .unwrap();
        if active {
            score.record_activity(now);
        }
        score
    }

    #[tokio::test]
    async fn test_participation_creates_missing_profile() {
        let repo = InMemoryRepository::new();
        let id = Uuid::new_v4();

        let profile = repo.set_leaderboard_participation(id, false).await.unwrap();
        assert!(!profile.leaderboard_participation);
        assert!(profile.display_name.starts_with("Participant "));

        let stored = repo.get_participant(id).await.unwrap().unwrap();
        assert_eq!(stored, profile);

        let profile = repo.set_leaderboard_participation(id, true).await.unwrap();
        assert!(profile.leaderboard_participation);
        assert_eq!(profile.display_name, stored.display_name);
    }

    #[tokio::test]
    async fn test_rank_counts() {
        let repo = InMemoryRepository::new();
        for (d, active) in [(800.0, true), (600.0, false), (600.0, true), (200.0, true)] {
            repo.upsert_score(&score_with_total(d, active)).await.unwrap();
        }

        assert_eq!(repo.count_with_score_greater_than(300.0, None).await.unwrap(), 1);
        assert_eq!(repo.count_with_score_greater_than(100.0, None).await.unwrap(), 3);

        let week = LeaderboardPeriod::Weekly.window_start(Utc::now());
        assert_eq!(repo.count_with_score_greater_than(100.0, week).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_recompute_all_ranks_shares_rank_on_ties() {
        let repo = InMemoryRepository::new();
        let top = score_with_total(800.0, true);
        let tied_inactive = score_with_total(600.0, false);
        let tied_active = score_with_total(600.0, true);
        for s in [&top, &tied_inactive, &tied_active] {
            repo.upsert_score(s).await.unwrap();
        }

        let week = LeaderboardPeriod::Weekly.window_start(Utc::now());
        assert_eq!(repo.recompute_all_ranks(week).await.unwrap(), 3);

        let inactive = repo.get_score(tied_inactive.participant_id).await.unwrap().unwrap();
        assert_eq!(inactive.global_rank, Some(2));
        assert_eq!(inactive.period_rank, None);

        let active = repo.get_score(tied_active.participant_id).await.unwrap().unwrap();
        assert_eq!(active.global_rank, Some(2));
        assert_eq!(active.period_rank, Some(2));
    }

    #[tokio::test]
    async fn test_top_n_filters_period_and_orders() {
        let repo = InMemoryRepository::new();
        for (d, active) in [(100.0, true), (900.0, false), (500.0, true)] {
            repo.upsert_score(&score_with_total(d, active)).await.unwrap();
        }

        let weekly = repo
            .top_n_by_category(LeaderboardCategory::Donation, LeaderboardPeriod::Weekly, 10)
            .await
            .unwrap();
        let scores: Vec<f64> = weekly.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![500.0, 100.0]);

        let all_time = repo
            .top_n_by_category(LeaderboardCategory::Overall, LeaderboardPeriod::AllTime, 2)
            .await
            .unwrap();
        let totals: Vec<f64> = all_time.iter().map(|r| r.score).collect();
        assert_eq!(totals, vec![450.0, 250.0]);
    }
}
