use chrono::{DateTime, Utc};
use serde::Serialize;
use storage::models::LeaderboardKey;

use super::RankingEngine;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

/// Point-in-time freshness of scores and leaderboards. Monitoring only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub total_scores: i64,
    pub stale_scores: i64,
    pub total_leaderboards: i64,
    pub stale_leaderboards: Vec<LeaderboardKey>,
    pub score: f64,
    pub status: HealthStatus,
    pub reconciling: bool,
    pub checked_at: DateTime<Utc>,
}

fn ratio(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        0.0
    } else {
        (part as f64 / whole as f64).clamp(0.0, 1.0)
    }
}

/// `100 - 50 * stale score ratio - 50 * stale board ratio`, one decimal.
pub(crate) fn health_score(
    total_scores: i64,
    stale_scores: i64,
    total_boards: i64,
    stale_boards: i64,
) -> f64 {
    let raw =
        100.0 - 50.0 * ratio(stale_scores, total_scores) - 50.0 * ratio(stale_boards, total_boards);
    (raw * 10.0).round() / 10.0
}

impl HealthStatus {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Healthy
        } else if score >= 50.0 {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

impl RankingEngine {
    pub async fn health(&self) -> Result<HealthReport> {
        let config = self.config();
        let total_scores = self.repo().count_scores().await?;
        let stale_scores = self
            .repo()
            .count_stale_scores(config.score_staleness_secs)
            .await?;
        let total_leaderboards = self.repo().count_leaderboards().await?;
        let stale_leaderboards = self
            .repo()
            .list_stale_leaderboards(config.leaderboard_staleness_secs)
            .await?;

        let score = health_score(
            total_scores,
            stale_scores,
            total_leaderboards,
            stale_leaderboards.len() as i64,
        );

        Ok(HealthReport {
            total_scores,
            stale_scores,
            total_leaderboards,
            stale_leaderboards,
            score,
            status: HealthStatus::from_score(score),
            reconciling: self.is_reconciling(),
            checked_at: Utc::now(),
        })
    }
}
