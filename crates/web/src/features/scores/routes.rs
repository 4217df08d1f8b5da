use axum::{Router, routing::get};
use scoring::RankingEngine;

use super::handlers::get_score;

pub fn routes() -> Router<RankingEngine> {
    Router::new().route("/:participant_id", get(get_score))
}
