use axum::{Router, middleware, routing::post};
use scoring::RankingEngine;

use super::handlers::{recompute_participant, reconcile, reset_leaderboard, rollover_period};
use crate::middleware::auth::{ApiKeys, require_auth};

pub fn routes(api_keys: ApiKeys) -> Router<RankingEngine> {
    Router::new()
        .route("/leaderboards/:category/:period/reset", post(reset_leaderboard))
        .route("/periods/:period/rollover", post(rollover_period))
        .route("/participants/:participant_id/recompute", post(recompute_participant))
        .route("/reconcile", post(reconcile))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth))
}
