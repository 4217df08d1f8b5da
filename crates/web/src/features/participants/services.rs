use scoring::{RankingEngine, Result};
use storage::dto::common::PaginationParams;
use storage::dto::leaderboard::LeaderboardView;
use uuid::Uuid;

pub async fn get_friends_leaderboard(
    engine: &RankingEngine,
    participant_id: Uuid,
    pagination: PaginationParams,
) -> Result<LeaderboardView> {
    engine
        .get_friends_leaderboard(participant_id, pagination.page, pagination.page_size)
        .await
}

pub async fn update_privacy(
    engine: &RankingEngine,
    participant_id: Uuid,
    enabled: bool,
) -> Result<usize> {
    engine
        .update_privacy_participation(participant_id, enabled)
        .await
}

pub async fn erase_participant(engine: &RankingEngine, participant_id: Uuid) -> Result<bool> {
    engine.erase_participant(participant_id).await
}
