pub mod calculator;
pub mod config;
pub mod engine;
pub mod error;
pub mod sources;

#[cfg(test)]
pub(crate) mod testing;

pub use calculator::{Calculation, ScoreCalculator};
pub use config::EngineConfig;
pub use engine::{
    CancelToken, EnginePhase, HealthReport, HealthStatus, RankingEngine, ReconcileReport,
    Reconciler, TriggerReport,
};
pub use error::{EngineError, Result, UpstreamError};
pub use sources::{
    AchievementProgress, ActivitySources, Contribution, ContributionSource, GameSession,
    GameplaySource, SocialActivity, SocialSource,
};
