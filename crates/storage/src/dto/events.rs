use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::ActivityDomain;

/// Activity notification pushed by an upstream domain system.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ActivityEventRequest {
    pub participant_id: Uuid,
    pub domain: ActivityDomain,
    #[validate(length(min = 1, max = 64, message = "source must be between 1 and 64 characters"))]
    pub source: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub context: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrivacyUpdateRequest {
    pub leaderboard_participation: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AcceptedResponse {
    pub accepted: bool,
    pub participant_id: Uuid,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrivacyUpdateResponse {
    pub participant_id: Uuid,
    pub leaderboard_participation: bool,
    /// Stored leaderboards the participant was added to or removed from.
    pub boards_changed: usize,
}
