use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scoring::RankingEngine;
use serde_json::json;
use storage::models::{LeaderboardCategory, LeaderboardPeriod};
use uuid::Uuid;

use crate::error::WebError;
use crate::features::leaderboards::handlers::parse_board;

use super::services;

#[utoipa::path(
    post,
    path = "/api/admin/leaderboards/{category}/{period}/reset",
    params(
        ("category" = LeaderboardCategory, Path, description = "Leaderboard category"),
        ("period" = LeaderboardPeriod, Path, description = "Leaderboard period")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 204, description = "Leaderboard emptied"),
        (status = 400, description = "Unknown category or period"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "admin"
)]
pub async fn reset_leaderboard(
    State(engine): State<RankingEngine>,
    Path((category, period)): Path<(String, String)>,
) -> Result<Response, WebError> {
    let (category, period) = parse_board(&category, &period)?;

    services::reset_leaderboard(&engine, category, period).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

#[utoipa::path(
    post,
    path = "/api/admin/periods/{period}/rollover",
    params(
        ("period" = LeaderboardPeriod, Path, description = "daily, weekly or monthly")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Every category's board for the period emptied"),
        (status = 400, description = "Unknown period, or all_time"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "admin"
)]
pub async fn rollover_period(
    State(engine): State<RankingEngine>,
    Path(period): Path<String>,
) -> Result<Response, WebError> {
    let period: LeaderboardPeriod = period.parse()?;

    let cleared = services::rollover_period(&engine, period).await?;

    Ok(Json(json!({ "period": period, "cleared": cleared })).into_response())
}

#[utoipa::path(
    post,
    path = "/api/admin/participants/{participant_id}/recompute",
    params(
        ("participant_id" = Uuid, Path, description = "Participant id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Score recomputed and propagated"),
        (status = 401, description = "Unauthorized"),
        (status = 503, description = "Score could not be persisted")
    ),
    tag = "admin"
)]
pub async fn recompute_participant(
    State(engine): State<RankingEngine>,
    Path(participant_id): Path<Uuid>,
) -> Result<Response, WebError> {
    let report = services::recompute_participant(&engine, participant_id).await?;

    Ok(Json(report).into_response())
}

#[utoipa::path(
    post,
    path = "/api/admin/reconcile",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Reconciliation pass finished"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A reconciliation pass is already running")
    ),
    tag = "admin"
)]
pub async fn reconcile(State(engine): State<RankingEngine>) -> Result<Response, WebError> {
    match services::reconcile(&engine).await {
        Some(report) => Ok(Json(report).into_response()),
        None => Err(WebError::Conflict(
            "a reconciliation pass is already running".to_string(),
        )),
    }
}
