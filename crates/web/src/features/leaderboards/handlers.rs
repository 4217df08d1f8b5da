use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use scoring::RankingEngine;
use storage::{
    dto::leaderboard::{LeaderboardQuery, LeaderboardView, TopPerformersQuery},
    models::{LeaderboardCategory, LeaderboardEntry, LeaderboardPeriod},
};
use validator::Validate;

use crate::error::WebError;

use super::services;

/// Parses the `{category}/{period}` path pair shared by the leaderboard routes.
pub fn parse_board(
    category: &str,
    period: &str,
) -> Result<(LeaderboardCategory, LeaderboardPeriod), WebError> {
    Ok((
        category.parse::<LeaderboardCategory>()?,
        period.parse::<LeaderboardPeriod>()?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/leaderboards/{category}/{period}",
    params(
        ("category" = LeaderboardCategory, Path, description = "overall, gaming, social or donation"),
        ("period" = LeaderboardPeriod, Path, description = "daily, weekly, monthly or all_time"),
        LeaderboardQuery
    ),
    responses(
        (status = 200, description = "One page of the leaderboard", body = LeaderboardView),
        (status = 400, description = "Unknown category or period, or invalid page")
    ),
    tag = "leaderboards"
)]
pub async fn get_leaderboard(
    State(engine): State<RankingEngine>,
    Path((category, period)): Path<(String, String)>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Response, WebError> {
    query.pagination().validate().map_err(WebError::BadRequest)?;
    let (category, period) = parse_board(&category, &period)?;

    let view = services::get_leaderboard(&engine, category, period, &query).await?;

    Ok(Json(view).into_response())
}

#[utoipa::path(
    get,
    path = "/api/leaderboards/{category}/{period}/top",
    params(
        ("category" = LeaderboardCategory, Path, description = "overall, gaming, social or donation"),
        ("period" = LeaderboardPeriod, Path, description = "daily, weekly, monthly or all_time"),
        TopPerformersQuery
    ),
    responses(
        (status = 200, description = "Highest ranked entries", body = Vec<LeaderboardEntry>),
        (status = 400, description = "Validation error")
    ),
    tag = "leaderboards"
)]
pub async fn get_top_performers(
    State(engine): State<RankingEngine>,
    Path((category, period)): Path<(String, String)>,
    Query(query): Query<TopPerformersQuery>,
) -> Result<Response, WebError> {
    query.validate()?;
    let (category, period) = parse_board(&category, &period)?;

    let entries = services::get_top_performers(&engine, category, period, query.limit).await?;

    Ok(Json(entries).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_board_accepts_aliases() {
        let (category, period) = parse_board("Global", "weekly").unwrap();
        assert_eq!(category, LeaderboardCategory::Overall);
        assert_eq!(period, LeaderboardPeriod::Weekly);
        assert!(parse_board("chess", "weekly").is_err());
        assert!(parse_board("gaming", "yearly").is_err());
    }
}
