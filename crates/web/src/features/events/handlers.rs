use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scoring::RankingEngine;
use storage::dto::events::{AcceptedResponse, ActivityEventRequest};
use validator::Validate;

use crate::error::WebError;

use super::services;

#[utoipa::path(
    post,
    path = "/api/events",
    request_body = ActivityEventRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 202, description = "Update queued", body = AcceptedResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "events"
)]
pub async fn submit_event(
    State(engine): State<RankingEngine>,
    Json(req): Json<ActivityEventRequest>,
) -> Result<Response, WebError> {
    req.validate()?;

    let participant_id = req.participant_id;
    services::submit_event(&engine, req);

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            accepted: true,
            participant_id,
        }),
    )
        .into_response())
}
