use scoring::{HealthReport, RankingEngine, Result};

pub async fn get_ranking_health(engine: &RankingEngine) -> Result<HealthReport> {
    engine.health().await
}
