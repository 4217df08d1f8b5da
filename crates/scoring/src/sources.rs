//! Activity-domain collaborators. They return raw facts only; all weighting
//! happens in [`crate::calculator`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::UpstreamError;

pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub game_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub tournament: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AchievementProgress {
    pub unlocked: u32,
    pub available: u32,
}

/// Social counters over the requested window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialActivity {
    pub friend_count: u32,
    pub challenges_completed: u32,
    pub community_contributions: u32,
    pub shares: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub amount: f64,
    pub cause: String,
    pub made_at: DateTime<Utc>,
    #[serde(default)]
    pub special_event: bool,
}

#[async_trait]
pub trait GameplaySource: Send + Sync {
    async fn sessions(
        &self,
        participant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> UpstreamResult<Vec<GameSession>>;

    async fn achievements(&self, participant_id: Uuid) -> UpstreamResult<AchievementProgress>;
}

#[async_trait]
pub trait SocialSource: Send + Sync {
    async fn social_activity(
        &self,
        participant_id: Uuid,
        since: DateTime<Utc>,
    ) -> UpstreamResult<SocialActivity>;

    async fn interaction_count(
        &self,
        participant_id: Uuid,
        since: DateTime<Utc>,
    ) -> UpstreamResult<u32>;

    async fn friend_ids(&self, participant_id: Uuid) -> UpstreamResult<Vec<Uuid>>;
}

#[async_trait]
pub trait ContributionSource: Send + Sync {
    /// Full contribution ledger of a participant.
    async fn contributions(&self, participant_id: Uuid) -> UpstreamResult<Vec<Contribution>>;
}

#[derive(Clone)]
pub struct ActivitySources {
    pub gameplay: Arc<dyn GameplaySource>,
    pub social: Arc<dyn SocialSource>,
    pub contributions: Arc<dyn ContributionSource>,
}

impl ActivitySources {
    /// One client serving every domain.
    pub fn from_shared<S>(source: Arc<S>) -> Self
    where
        S: GameplaySource + SocialSource + ContributionSource + 'static,
    {
        Self {
            gameplay: source.clone(),
            social: source.clone(),
            contributions: source,
        }
    }
}
