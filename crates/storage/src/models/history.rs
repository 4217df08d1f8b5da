use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use utoipa::ToSchema;

use super::{LeaderboardPeriod, round2};

pub const DEFAULT_HISTORY_CAPACITY: usize = 90;

/// Below this relative change (in percent) a trend counts as stable.
const STABLE_THRESHOLD_PCT: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistorySample {
    pub recorded_at: DateTime<Utc>,
    pub total: f64,
    pub rank: Option<i64>,
    pub period: LeaderboardPeriod,
}

/// Fixed-capacity ring of score samples, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistory {
    capacity: usize,
    samples: VecDeque<HistorySample>,
}

impl Default for ScoreHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl ScoreHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Appends a sample, evicting the oldest ones once the ring is full.
    pub fn push(&mut self, sample: HistorySample) {
        if self.capacity == 0 {
            return;
        }
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Changes the retention window, dropping the oldest samples if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.samples.len() > capacity {
            self.samples.pop_front();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistorySample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&HistorySample> {
        self.samples.back()
    }

    pub fn since(&self, start: DateTime<Utc>) -> impl Iterator<Item = &HistorySample> {
        self.samples.iter().filter(move |s| s.recorded_at >= start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScoreTrend {
    pub direction: TrendDirection,
    pub window_days: i64,
    pub absolute_change: f64,
    pub percentage_change: f64,
    pub samples: usize,
}

impl ScoreTrend {
    pub(crate) fn between(oldest: f64, newest: f64, window_days: i64, samples: usize) -> Self {
        let change = newest - oldest;
        let pct = if oldest > 0.0 {
            change / oldest * 100.0
        } else if change > 0.0 {
            100.0
        } else {
            0.0
        };

        let direction = if pct.abs() < STABLE_THRESHOLD_PCT {
            TrendDirection::Stable
        } else if change > 0.0 {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };

        Self {
            direction,
            window_days,
            absolute_change: round2(change),
            percentage_change: round2(pct),
            samples,
        }
    }
}
