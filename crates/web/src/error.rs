use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scoring::EngineError;
use serde_json::json;
use std::fmt;
use storage::error::ScoreError;
use validator::ValidationErrors;

/// Web layer errors
#[derive(Debug)]
pub enum WebError {
    Engine(EngineError),
    Validation(ValidationErrors),
    BadRequest(String),
    Conflict(String),
    Unauthorized,
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(e) => write!(f, "Engine error: {}", e),
            Self::Validation(e) => write!(f, "Validation error: {}", e),
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::Unauthorized => write!(f, "Unauthorized"),
        }
    }
}

impl WebError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Engine(EngineError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Engine(EngineError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Engine(EngineError::Persistence { .. } | EngineError::Upstream(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Engine(EngineError::Configuration(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        let body = match &self {
            Self::Engine(EngineError::Validation(msg)) => json!({ "error": msg }),
            Self::Engine(EngineError::NotFound(msg)) => json!({ "error": msg }),
            Self::Engine(e @ (EngineError::Persistence { .. } | EngineError::Upstream(_))) => {
                tracing::error!("Retryable engine failure: {:?}", e);
                json!({
                    "error": "Service temporarily unavailable",
                    "retryable": true
                })
            }
            Self::Engine(e) => {
                tracing::error!("Engine error: {:?}", e);
                json!({
                    "error": "An internal error occurred"
                })
            }
            Self::Validation(errors) => {
                let field_errors: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .flat_map(|(field, errors)| {
                        errors.iter().map(move |e| {
                            format!(
                                "{}: {}",
                                field,
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| e.code.to_string())
                            )
                        })
                    })
                    .collect();

                json!({
                    "error": "Validation failed",
                    "details": field_errors
                })
            }
            Self::BadRequest(msg) | Self::Conflict(msg) => json!({ "error": msg }),
            Self::Unauthorized => json!({ "error": "Unauthorized" }),
        };

        (status_code, Json(body)).into_response()
    }
}

impl From<EngineError> for WebError {
    fn from(error: EngineError) -> Self {
        Self::Engine(error)
    }
}

impl From<ScoreError> for WebError {
    fn from(error: ScoreError) -> Self {
        Self::Engine(error.into())
    }
}

impl From<ValidationErrors> for WebError {
    fn from(error: ValidationErrors) -> Self {
        Self::Validation(error)
    }
}

pub type ApiResult<T> = Result<T, WebError>;
