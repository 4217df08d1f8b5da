use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use scoring::RankingEngine;
use storage::dto::score::{ScoreQuery, ScoreView};
use uuid::Uuid;

use crate::error::WebError;

use super::services;

#[utoipa::path(
    get,
    path = "/api/scores/{participant_id}",
    params(
        ("participant_id" = Uuid, Path, description = "Participant id"),
        ScoreQuery
    ),
    responses(
        (status = 200, description = "Current impact score with component breakdown", body = ScoreView),
        (status = 503, description = "Score could not be persisted, retry later")
    ),
    tag = "scores"
)]
pub async fn get_score(
    State(engine): State<RankingEngine>,
    Path(participant_id): Path<Uuid>,
    Query(query): Query<ScoreQuery>,
) -> Result<Response, WebError> {
    let score = services::get_score(&engine, participant_id, query.refresh).await?;

    Ok(Json(score).into_response())
}
