use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ParticipantProfile {
    pub participant_id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub level: Option<i32>,
    pub country: Option<String>,
    /// Privacy flag: opted-out participants only appear on friends leaderboards.
    pub leaderboard_participation: bool,
}

/// Lightweight profile copy embedded in leaderboard entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProfileSnapshot {
    pub avatar_url: Option<String>,
    pub level: Option<i32>,
    pub country: Option<String>,
}

impl ParticipantProfile {
    /// Profile created on demand for a participant nobody has registered yet.
    pub fn placeholder(participant_id: Uuid) -> Self {
        Self {
            participant_id,
            display_name: fallback_display_name(participant_id),
            avatar_url: None,
            level: None,
            country: None,
            leaderboard_participation: true,
        }
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            avatar_url: self.avatar_url.clone(),
            level: self.level,
            country: self.country.clone(),
        }
    }
}

/// Name shown for participants without a profile.
pub fn fallback_display_name(participant_id: Uuid) -> String {
    let simple = participant_id.simple().to_string();
    format!("Participant {}", &simple[..8])
}
