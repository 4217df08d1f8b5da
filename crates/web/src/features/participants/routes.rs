use axum::{
    Router, middleware,
    routing::{delete, get, put},
};
use scoring::RankingEngine;

use super::handlers::{erase_participant, get_friends_leaderboard, update_privacy};
use crate::middleware::auth::{ApiKeys, require_auth};

pub fn routes(api_keys: ApiKeys) -> Router<RankingEngine> {
    let protected = Router::new()
        .route("/:participant_id/privacy", put(update_privacy))
        .route("/:participant_id", delete(erase_participant))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth));

    Router::new()
        .route(
            "/:participant_id/friends-leaderboard",
            get(get_friends_leaderboard),
        )
        .merge(protected)
}
