use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use super::{ComponentKind, ComponentScores};
use crate::error::ScoreError;

/// Dimension a leaderboard ranks by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardCategory {
    Overall,
    Gaming,
    Social,
    Donation,
}

impl LeaderboardCategory {
    pub const ALL: [LeaderboardCategory; 4] =
        [Self::Overall, Self::Gaming, Self::Social, Self::Donation];

    pub fn component(self) -> Option<ComponentKind> {
        match self {
            Self::Overall => None,
            Self::Gaming => Some(ComponentKind::Gaming),
            Self::Social => Some(ComponentKind::Social),
            Self::Donation => Some(ComponentKind::Donation),
        }
    }

    /// The value this category ranks participants by.
    pub fn score_of(self, total: f64, components: &ComponentScores) -> f64 {
        match self.component() {
            Some(kind) => components.get(kind),
            None => total,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Overall => "overall",
            Self::Gaming => "gaming",
            Self::Social => "social",
            Self::Donation => "donation",
        }
    }
}

impl fmt::Display for LeaderboardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaderboardCategory {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overall" | "global" | "impact" => Ok(Self::Overall),
            other => other
                .parse::<ComponentKind>()
                .map(|kind| match kind {
                    ComponentKind::Gaming => Self::Gaming,
                    ComponentKind::Social => Self::Social,
                    ComponentKind::Donation => Self::Donation,
                })
                .map_err(|_| ScoreError::InvalidValue(format!("unknown category '{s}'"))),
        }
    }
}

/// Time window a leaderboard covers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardPeriod {
    Daily,
    Weekly,
    Monthly,
    AllTime,
}

impl LeaderboardPeriod {
    pub const ALL: [LeaderboardPeriod; 4] =
        [Self::Daily, Self::Weekly, Self::Monthly, Self::AllTime];

    /// Start of the window containing `now`, or `None` for all-time.
    pub fn window_start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        let start = match self {
            Self::Daily => today,
            Self::Weekly => today - Duration::days(i64::from(today.weekday().num_days_from_monday())),
            Self::Monthly => NaiveDate::from_ymd_opt(today.year(), today.month(), 1)?,
            Self::AllTime => return None,
        };
        Some(start.and_time(NaiveTime::MIN).and_utc())
    }

    /// Whether activity at `at` counts towards the window containing `now`.
    pub fn contains(self, at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match (self.window_start(now), at) {
            (None, _) => true,
            (Some(start), Some(at)) => at >= start,
            (Some(_), None) => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::AllTime => "all_time",
        }
    }
}

impl fmt::Display for LeaderboardPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaderboardPeriod {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "daily" | "day" => Ok(Self::Daily),
            "weekly" | "week" => Ok(Self::Weekly),
            "monthly" | "month" => Ok(Self::Monthly),
            "all_time" | "alltime" | "all" => Ok(Self::AllTime),
            _ => Err(ScoreError::InvalidValue(format!("unknown period '{s}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeaderboardKey {
    pub category: LeaderboardCategory,
    pub period: LeaderboardPeriod,
}

impl LeaderboardKey {
    pub fn new(category: LeaderboardCategory, period: LeaderboardPeriod) -> Self {
        Self { category, period }
    }

    /// Every stored (category, period) combination.
    pub fn all() -> impl Iterator<Item = LeaderboardKey> {
        LeaderboardCategory::ALL.into_iter().flat_map(|category| {
            LeaderboardPeriod::ALL
                .into_iter()
                .map(move |period| LeaderboardKey::new(category, period))
        })
    }
}

impl fmt::Display for LeaderboardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category, self.period)
    }
}

/// Upstream domain an activity event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActivityDomain {
    Gaming,
    Social,
    Donation,
}

impl ActivityDomain {
    pub fn component(self) -> ComponentKind {
        match self {
            Self::Gaming => ComponentKind::Gaming,
            Self::Social => ComponentKind::Social,
            Self::Donation => ComponentKind::Donation,
        }
    }
}

impl fmt::Display for ActivityDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.component().as_str())
    }
}

impl FromStr for ActivityDomain {
    type Err = ScoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<ComponentKind>()
            .map(|kind| match kind {
                ComponentKind::Gaming => Self::Gaming,
                ComponentKind::Social => Self::Social,
                ComponentKind::Donation => Self::Donation,
            })
            .map_err(|_| ScoreError::InvalidValue(format!("unknown activity domain '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_parsing_accepts_variants() {
        assert_eq!("all-time".parse::<LeaderboardPeriod>(), Ok(LeaderboardPeriod::AllTime));
        assert_eq!("ALLTIME".parse::<LeaderboardPeriod>(), Ok(LeaderboardPeriod::AllTime));
        assert_eq!("Weekly".parse::<LeaderboardPeriod>(), Ok(LeaderboardPeriod::Weekly));
        assert!("yearly".parse::<LeaderboardPeriod>().is_err());
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("global".parse::<LeaderboardCategory>(), Ok(LeaderboardCategory::Overall));
        assert_eq!("donation".parse::<LeaderboardCategory>(), Ok(LeaderboardCategory::Donation));
        assert!("friends".parse::<LeaderboardCategory>().is_err());
    }

    #[test]
    fn test_window_starts() {
        // Thursday
        let now = Utc.with_ymd_and_hms(2025, 3, 13, 15, 30, 0).unwrap();

        assert_eq!(
            LeaderboardPeriod::Daily.window_start(now),
            Some(Utc.with_ymd_and_hms(2025, 3, 13, 0, 0, 0).unwrap())
        );
        assert_eq!(
            LeaderboardPeriod::Weekly.window_start(now),
            Some(Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap())
        );
        assert_eq!(
            LeaderboardPeriod::Monthly.window_start(now),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(LeaderboardPeriod::AllTime.window_start(now), None);
    }

    #[test]
    fn test_period_contains() {
        let now = Utc.with_ymd_and_hms(2025, 3, 13, 15, 30, 0).unwrap();
        let last_week = Utc.with_ymd_and_hms(2025, 3, 7, 12, 0, 0).unwrap();

        assert!(LeaderboardPeriod::AllTime.contains(None, now));
        assert!(!LeaderboardPeriod::Weekly.contains(None, now));
        assert!(!LeaderboardPeriod::Weekly.contains(Some(last_week), now));
        assert!(LeaderboardPeriod::Monthly.contains(Some(last_week), now));
    }

    #[test]
    fn test_all_keys_cover_every_combination() {
        assert_eq!(LeaderboardKey::all().count(), 16);
    }
}
