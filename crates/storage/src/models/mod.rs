mod component;
mod history;
mod impact_score;
mod leaderboard;
mod leaderboard_key;
mod participant;

pub use component::{
    ComponentDetail, ComponentKind, ComponentScores, ComponentSpec, ScoreModel, round2,
};
pub use history::{
    DEFAULT_HISTORY_CAPACITY, HistorySample, ScoreHistory, ScoreTrend, TrendDirection,
};
pub use impact_score::ImpactScore;
pub use leaderboard::{
    Leaderboard, LeaderboardEntry, LeaderboardMetadata, MAX_PAGE_SIZE, percentile, validate_page,
};
pub use leaderboard_key::{ActivityDomain, LeaderboardCategory, LeaderboardKey, LeaderboardPeriod};
pub use participant::{ParticipantProfile, ProfileSnapshot, fallback_display_name};
