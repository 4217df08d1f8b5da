use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::models::{ComponentDetail, ComponentKind, ScoreTrend};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ComponentView {
    pub kind: ComponentKind,
    pub value: f64,
    pub max: f64,
    pub weight: f64,
    /// `value × weight`, the component's contribution to the total.
    pub weighted: f64,
    pub detail: ComponentDetail,
}

/// Participant-visible projection of an impact score.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScoreView {
    pub participant_id: Uuid,
    pub total: f64,
    pub components: Vec<ComponentView>,
    pub global_rank: Option<i64>,
    pub period_rank: Option<i64>,
    pub percentile: Option<f64>,
    pub trend_7d: Option<ScoreTrend>,
    pub trend_30d: Option<ScoreTrend>,
    pub last_calculated: Option<DateTime<Utc>>,
    pub is_stale: bool,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ScoreQuery {
    /// Recompute even when the cached score is still fresh.
    #[serde(default)]
    pub refresh: bool,
}
