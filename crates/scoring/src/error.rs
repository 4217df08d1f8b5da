use storage::error::{ScoreError, StorageError};
use storage::models::ImpactScore;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure of an activity-domain collaborator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    #[error("{source_name} unavailable: {message}")]
    Unavailable {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name} timed out after {millis} ms")]
    Timeout {
        source_name: &'static str,
        millis: u128,
    },
}

impl UpstreamError {
    pub fn unavailable(source_name: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            source_name,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// The computed score is carried along so only the write has to be retried.
    #[error("Persistence failure: {source}")]
    Persistence {
        #[source]
        source: StorageError,
        score: Option<Box<ImpactScore>>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    pub fn participant_not_found(participant_id: Uuid) -> Self {
        Self::NotFound(format!("no score for participant {participant_id}"))
    }

    pub fn persistence(source: StorageError, score: ImpactScore) -> Self {
        Self::Persistence {
            source,
            score: Some(Box::new(score)),
        }
    }

    /// Persistence and upstream failures may succeed when retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::Upstream(_))
    }

    /// Score computed before a failed write, if any.
    pub fn into_unsaved_score(self) -> Option<ImpactScore> {
        match self {
            Self::Persistence { score, .. } => score.map(|s| *s),
            _ => None,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound => Self::NotFound("resource not found".to_string()),
            other => Self::Persistence {
                source: other,
                score: None,
            },
        }
    }
}

impl From<ScoreError> for EngineError {
    fn from(error: ScoreError) -> Self {
        match error {
            ScoreError::ParticipantNotFound(id) => {
                Self::NotFound(format!("participant {id} is not ranked"))
            }
            ScoreError::InsufficientData { .. } => Self::NotFound(error.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}
