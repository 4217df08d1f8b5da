pub mod admin;
pub mod events;
pub mod health;
pub mod leaderboards;
pub mod participants;
pub mod scores;

use axum::Router;
use scoring::RankingEngine;

use crate::middleware::auth::ApiKeys;

pub fn router(api_keys: ApiKeys) -> Router<RankingEngine> {
    Router::new()
        .nest("/api/scores", scores::routes::routes())
        .nest("/api/leaderboards", leaderboards::routes::routes())
        .nest(
            "/api/participants",
            participants::routes::routes(api_keys.clone()),
        )
        .nest("/api/events", events::routes::routes(api_keys.clone()))
        .nest("/api/admin", admin::routes::routes(api_keys))
        .nest("/api/health", health::routes::routes())
}
