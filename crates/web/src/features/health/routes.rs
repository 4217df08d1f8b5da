use axum::{Router, routing::get};
use scoring::RankingEngine;

use super::handlers::get_ranking_health;

pub fn routes() -> Router<RankingEngine> {
    Router::new().route("/ranking", get(get_ranking_health))
}
