use scoring::{CancelToken, RankingEngine, ReconcileReport, Result, TriggerReport};
use storage::models::{LeaderboardCategory, LeaderboardPeriod};
use uuid::Uuid;

pub async fn reset_leaderboard(
    engine: &RankingEngine,
    category: LeaderboardCategory,
    period: LeaderboardPeriod,
) -> Result<()> {
    engine.reset_leaderboard(category, period).await
}

pub async fn rollover_period(engine: &RankingEngine, period: LeaderboardPeriod) -> Result<usize> {
    engine.rollover_period(period).await
}

pub async fn recompute_participant(
    engine: &RankingEngine,
    participant_id: Uuid,
) -> Result<TriggerReport> {
    engine.recompute_participant(participant_id).await
}

/// `None` when a pass is already running.
pub async fn reconcile(engine: &RankingEngine) -> Option<ReconcileReport> {
    engine.run_reconciliation(&CancelToken::new()).await
}
