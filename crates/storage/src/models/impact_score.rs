use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    ComponentDetail, ComponentKind, ComponentScores, HistorySample, LeaderboardCategory,
    LeaderboardPeriod, ScoreHistory, ScoreModel, ScoreTrend,
};
use crate::error::ScoreError;

/// Weighted impact score of a single participant.
///
/// Component values are kept private so the total can only change through
/// [`ImpactScore::set_component`], which re-derives it from the components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactScore {
    pub participant_id: Uuid,
    components: ComponentScores,
    total: f64,
    gaming_detail: ComponentDetail,
    social_detail: ComponentDetail,
    donation_detail: ComponentDetail,
    pub history: ScoreHistory,
    pub global_rank: Option<i64>,
    pub period_rank: Option<i64>,
    pub last_calculated: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ImpactScore {
    pub fn new(participant_id: Uuid, history_capacity: usize, now: DateTime<Utc>) -> Self {
        Self {
            participant_id,
            components: ComponentScores::default(),
            total: 0.0,
            gaming_detail: ComponentDetail::default(),
            social_detail: ComponentDetail::default(),
            donation_detail: ComponentDetail::default(),
            history: ScoreHistory::with_capacity(history_capacity),
            global_rank: None,
            period_rank: None,
            last_calculated: None,
            last_activity_at: None,
            created_at: now,
        }
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn component(&self, kind: ComponentKind) -> f64 {
        self.components.get(kind)
    }

    pub fn components(&self) -> ComponentScores {
        self.components
    }

    pub fn detail(&self, kind: ComponentKind) -> &ComponentDetail {
        match kind {
            ComponentKind::Gaming => &self.gaming_detail,
            ComponentKind::Social => &self.social_detail,
            ComponentKind::Donation => &self.donation_detail,
        }
    }

    /// The value this participant is ranked by on a `category` leaderboard.
    pub fn score_for(&self, category: LeaderboardCategory) -> f64 {
        category.score_of(self.total, &self.components)
    }

    /// Replaces one component and its detail, then re-derives the total.
    ///
    /// Values outside `[0, max]` are rejected and leave the score untouched.
    pub fn set_component(
        &mut self,
        model: &ScoreModel,
        kind: ComponentKind,
        value: f64,
        detail: ComponentDetail,
    ) -> Result<(), ScoreError> {
        let max = model.max(kind);
        if !value.is_finite() || value < 0.0 || value > max {
            return Err(ScoreError::OutOfRange { kind, value, max });
        }

        self.components.set(kind, value);
        match kind {
            ComponentKind::Gaming => self.gaming_detail = detail,
            ComponentKind::Social => self.social_detail = detail,
            ComponentKind::Donation => self.donation_detail = detail,
        }
        self.total = model.weighted_total(&self.components);

        Ok(())
    }

    pub fn append_history_sample(
        &mut self,
        total: f64,
        rank: Option<i64>,
        period: LeaderboardPeriod,
        recorded_at: DateTime<Utc>,
    ) {
        self.history.push(HistorySample {
            recorded_at,
            total,
            rank,
            period,
        });
    }

    /// Compares the oldest and newest samples recorded in the last `window_days`.
    pub fn trend(&self, window_days: i64, now: DateTime<Utc>) -> Result<ScoreTrend, ScoreError> {
        let start = now - Duration::days(window_days);
        let in_window: Vec<&HistorySample> = self.history.since(start).collect();

        match (in_window.first(), in_window.last()) {
            (Some(oldest), Some(newest)) if in_window.len() >= 2 => Ok(ScoreTrend::between(
                oldest.total,
                newest.total,
                window_days,
                in_window.len(),
            )),
            _ => Err(ScoreError::InsufficientData {
                samples: in_window.len(),
                window_days,
            }),
        }
    }

    /// A score that was never calculated is always stale.
    pub fn is_stale(&self, max_age_seconds: i64, now: DateTime<Utc>) -> bool {
        match self.last_calculated {
            Some(at) => now - at > Duration::seconds(max_age_seconds),
            None => true,
        }
    }

    pub fn mark_calculated(&mut self, at: DateTime<Utc>) {
        self.last_calculated = Some(at);
    }

    pub fn record_activity(&mut self, at: DateTime<Utc>) {
        self.last_activity_at = Some(at);
    }

    pub fn is_active_in(&self, period: LeaderboardPeriod, now: DateTime<Utc>) -> bool {
        period.contains(self.last_activity_at, now)
    }
}
