use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use scoring::RankingEngine;

use crate::error::WebError;

use super::services;

#[utoipa::path(
    get,
    path = "/api/health/ranking",
    responses(
        (status = 200, description = "Score and leaderboard freshness with a 0-100 health score"),
        (status = 503, description = "Repository unreachable")
    ),
    tag = "health"
)]
pub async fn get_ranking_health(State(engine): State<RankingEngine>) -> Result<Response, WebError> {
    let report = services::get_ranking_health(&engine).await?;

    Ok(Json(report).into_response())
}
