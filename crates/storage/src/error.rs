use thiserror::Error;
use uuid::Uuid;

use crate::models::ComponentKind;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors raised by the in-memory score and leaderboard models.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoreError {
    #[error("{kind} component value {value} is outside [0, {max}]")]
    OutOfRange {
        kind: ComponentKind,
        value: f64,
        max: f64,
    },

    #[error("Insufficient data: {samples} sample(s) in the last {window_days} day(s)")]
    InsufficientData { samples: usize, window_days: i64 },

    #[error("Participant {0} is not on this leaderboard")]
    ParticipantNotFound(Uuid),

    #[error("Invalid page: {0}")]
    InvalidPage(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
