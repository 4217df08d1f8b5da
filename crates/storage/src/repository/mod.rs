use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ComponentScores, ImpactScore, Leaderboard, LeaderboardCategory, LeaderboardKey,
    LeaderboardPeriod, ParticipantProfile,
};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PgScoreRepository;

/// One participant as returned by a top-N query, before privacy filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRecord {
    pub participant_id: Uuid,
    /// Value for the queried category (total or a single component).
    pub score: f64,
    pub total: f64,
    pub components: ComponentScores,
    /// `None` when the participant has no profile yet.
    pub profile: Option<ParticipantProfile>,
}

/// Persistence boundary of the scoring engine.
#[async_trait]
pub trait ScoreRepository: Send + Sync {
    async fn get_score(&self, participant_id: Uuid) -> Result<Option<ImpactScore>>;

    async fn get_scores(&self, participant_ids: &[Uuid]) -> Result<Vec<ImpactScore>>;

    async fn upsert_score(&self, score: &ImpactScore) -> Result<bool>;

    async fn delete_score(&self, participant_id: Uuid) -> Result<bool>;

    /// Participants whose total is strictly greater than `threshold`, optionally
    /// restricted to those active since `active_since`.
    async fn count_with_score_greater_than(
        &self,
        threshold: f64,
        active_since: Option<DateTime<Utc>>,
    ) -> Result<i64>;

    /// Recomputes global and period ranks for the whole population in one pass.
    async fn recompute_all_ranks(&self, active_since: Option<DateTime<Utc>>) -> Result<u64>;

    async fn count_scores(&self) -> Result<i64>;

    async fn count_stale_scores(&self, threshold_seconds: i64) -> Result<i64>;

    async fn top_n_by_category(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
        n: usize,
    ) -> Result<Vec<RankedRecord>>;

    async fn get_participant(&self, participant_id: Uuid) -> Result<Option<ParticipantProfile>>;

    async fn get_participants(&self, participant_ids: &[Uuid]) -> Result<Vec<ParticipantProfile>>;

    /// Sets the privacy flag, creating a placeholder profile when none exists.
    async fn set_leaderboard_participation(
        &self,
        participant_id: Uuid,
        enabled: bool,
    ) -> Result<ParticipantProfile>;

    async fn get_leaderboard(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
    ) -> Result<Option<Leaderboard>>;

    async fn upsert_leaderboard(&self, leaderboard: &Leaderboard) -> Result<bool>;

    async fn list_stale_leaderboards(&self, threshold_seconds: i64) -> Result<Vec<LeaderboardKey>>;

    async fn count_leaderboards(&self) -> Result<i64>;

    async fn remove_participant(
        &self,
        category: LeaderboardCategory,
        period: LeaderboardPeriod,
        participant_id: Uuid,
    ) -> Result<bool>;
}
