use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::common::{PaginationMeta, PaginationParams};
use crate::models::{
    LeaderboardCategory, LeaderboardEntry, LeaderboardMetadata, LeaderboardPeriod,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct LeaderboardQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Requester whose own position is included in the response.
    pub participant_id: Option<Uuid>,
}

impl LeaderboardQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams::new(self.page, self.page_size)
    }
}

fn default_page() -> u32 {
    PaginationParams::default().page
}

fn default_page_size() -> u32 {
    PaginationParams::default().page_size
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct TopPerformersQuery {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: u32,
}

fn default_limit() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RequesterPosition {
    pub entry: LeaderboardEntry,
    pub percentile: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardView {
    /// `None` for friends leaderboards.
    pub category: Option<LeaderboardCategory>,
    pub period: LeaderboardPeriod,
    pub entries: Vec<LeaderboardEntry>,
    pub pagination: PaginationMeta,
    pub metadata: LeaderboardMetadata,
    pub requester: Option<RequesterPosition>,
    pub last_refreshed: Option<DateTime<Utc>>,
}
