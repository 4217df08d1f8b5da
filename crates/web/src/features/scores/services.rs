use scoring::{RankingEngine, Result};
use storage::dto::score::ScoreView;
use uuid::Uuid;

pub async fn get_score(
    engine: &RankingEngine,
    participant_id: Uuid,
    refresh: bool,
) -> Result<ScoreView> {
    engine.get_score(participant_id, refresh).await
}
