use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scoring::{EngineError, RankingEngine};
use storage::dto::{
    common::PaginationParams,
    events::{PrivacyUpdateRequest, PrivacyUpdateResponse},
    leaderboard::LeaderboardView,
};
use uuid::Uuid;

use crate::error::WebError;

use super::services;

#[utoipa::path(
    get,
    path = "/api/participants/{participant_id}/friends-leaderboard",
    params(
        ("participant_id" = Uuid, Path, description = "Requesting participant"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "Requester and friends ranked by total score", body = LeaderboardView),
        (status = 400, description = "Invalid page")
    ),
    tag = "participants"
)]
pub async fn get_friends_leaderboard(
    State(engine): State<RankingEngine>,
    Path(participant_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<Response, WebError> {
    pagination.validate().map_err(WebError::BadRequest)?;

    let view = services::get_friends_leaderboard(&engine, participant_id, pagination).await?;

    Ok(Json(view).into_response())
}

#[utoipa::path(
    put,
    path = "/api/participants/{participant_id}/privacy",
    params(
        ("participant_id" = Uuid, Path, description = "Participant id")
    ),
    request_body = PrivacyUpdateRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Leaderboard participation updated", body = PrivacyUpdateResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "participants"
)]
pub async fn update_privacy(
    State(engine): State<RankingEngine>,
    Path(participant_id): Path<Uuid>,
    Json(req): Json<PrivacyUpdateRequest>,
) -> Result<Response, WebError> {
    let boards_changed =
        services::update_privacy(&engine, participant_id, req.leaderboard_participation).await?;

    Ok(Json(PrivacyUpdateResponse {
        participant_id,
        leaderboard_participation: req.leaderboard_participation,
        boards_changed,
    })
    .into_response())
}

#[utoipa::path(
    delete,
    path = "/api/participants/{participant_id}",
    params(
        ("participant_id" = Uuid, Path, description = "Participant id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 204, description = "Score deleted and participant purged from all leaderboards"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Nothing stored for this participant")
    ),
    tag = "participants"
)]
pub async fn erase_participant(
    State(engine): State<RankingEngine>,
    Path(participant_id): Path<Uuid>,
) -> Result<Response, WebError> {
    if !services::erase_participant(&engine, participant_id).await? {
        return Err(EngineError::participant_not_found(participant_id).into());
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}
