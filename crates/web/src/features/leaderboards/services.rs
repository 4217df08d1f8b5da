use scoring::{RankingEngine, Result};
use storage::dto::leaderboard::{LeaderboardQuery, LeaderboardView};
use storage::models::{LeaderboardCategory, LeaderboardEntry, LeaderboardPeriod};

pub async fn get_leaderboard(
    engine: &RankingEngine,
    category: LeaderboardCategory,
    period: LeaderboardPeriod,
    query: &LeaderboardQuery,
) -> Result<LeaderboardView> {
    engine
        .get_leaderboard(
            category,
            period,
            query.participant_id,
            query.page,
            query.page_size,
        )
        .await
}

pub async fn get_top_performers(
    engine: &RankingEngine,
    category: LeaderboardCategory,
    period: LeaderboardPeriod,
    limit: u32,
) -> Result<Vec<LeaderboardEntry>> {
    engine.get_top_performers(category, period, limit).await
}
