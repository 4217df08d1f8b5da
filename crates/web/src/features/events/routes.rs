use axum::{Router, middleware, routing::post};
use scoring::RankingEngine;

use super::handlers::submit_event;
use crate::middleware::auth::{ApiKeys, require_auth};

pub fn routes(api_keys: ApiKeys) -> Router<RankingEngine> {
    Router::new()
        .route("/", post(submit_event))
        .route_layer(middleware::from_fn_with_state(api_keys, require_auth))
}
