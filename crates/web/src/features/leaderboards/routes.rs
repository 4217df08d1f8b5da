use axum::{Router, routing::get};
use scoring::RankingEngine;

use super::handlers::{get_leaderboard, get_top_performers};

pub fn routes() -> Router<RankingEngine> {
    Router::new()
        .route("/:category/:period", get(get_leaderboard))
        .route("/:category/:period/top", get(get_top_performers))
}
