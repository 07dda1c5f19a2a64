use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine_client::EngineClientError;

/// Failure of one pass through the analysis pipeline.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, PipelineError>`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The caller sent something we refuse to analyze.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// The analysis engine could not be reached at all.
    #[error("Analysis engine unreachable: {detail}")]
    EngineUnreachable { detail: String, hint: String },

    /// The engine answered, but not with a usable analysis.
    #[error("Analysis engine error: {0}")]
    EngineError(String),

    /// The engine could not produce its skills catalog.
    #[error("Skills lookup failed: {0}")]
    SkillsLookup(String),

    #[error("Internal failure: {0}")]
    InternalFailure(#[from] anyhow::Error),
}

/// JSON envelope shared by every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::ValidationFailed(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            PipelineError::EngineUnreachable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::EngineError(_)
            | PipelineError::SkillsLookup(_)
            | PipelineError::InternalFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ValidationFailed(_) => "validation_failed",
            PipelineError::EngineUnreachable { .. } => "engine_unreachable",
            PipelineError::EngineError(_) => "engine_error",
            PipelineError::SkillsLookup(_) => "skills_lookup_failed",
            PipelineError::InternalFailure(_) => "internal_failure",
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            PipelineError::ValidationFailed(msg) => ErrorBody {
                message: msg.clone(),
                error: None,
                hint: None,
            },
            PipelineError::EngineUnreachable { detail, hint } => ErrorBody {
                message: "AI service is unavailable".to_string(),
                error: Some(detail.clone()),
                hint: Some(hint.clone()),
            },
            PipelineError::EngineError(msg) => ErrorBody {
                message: "Error analyzing resume".to_string(),
                error: Some(msg.clone()),
                hint: None,
            },
            PipelineError::SkillsLookup(msg) => ErrorBody {
                message: "Error fetching skills".to_string(),
                error: Some(msg.clone()),
                hint: None,
            },
            PipelineError::InternalFailure(_) => ErrorBody {
                message: "Internal server error".to_string(),
                error: None,
                hint: None,
            },
        }
    }
}

impl From<EngineClientError> for PipelineError {
    fn from(err: EngineClientError) -> Self {
        match err {
            EngineClientError::Unreachable { url, detail } => PipelineError::EngineUnreachable {
                detail,
                hint: format!(
                    "Start the analysis engine and make sure it is reachable at {url}"
                ),
            },
            EngineClientError::Timeout(after) => PipelineError::EngineError(format!(
                "AI analysis timed out after {} seconds",
                after.as_secs()
            )),
            EngineClientError::Api { message, .. } => PipelineError::EngineError(message),
            EngineClientError::InvalidResponse(detail) => PipelineError::EngineError(format!(
                "AI model returned an unreadable response: {detail}"
            )),
            EngineClientError::Http(e) => {
                PipelineError::EngineError(format!("Request to the AI model failed: {e}"))
            }
            EngineClientError::Io(e) => PipelineError::InternalFailure(
                anyhow::Error::new(e).context("Failed to read staged upload"),
            ),
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        match &self {
            PipelineError::InternalFailure(e) => tracing::error!("Internal error: {e:?}"),
            PipelineError::EngineUnreachable { detail, .. } => {
                tracing::warn!("Analysis engine unreachable: {detail}")
            }
            PipelineError::EngineError(msg) => tracing::warn!("Analysis engine error: {msg}"),
            PipelineError::SkillsLookup(msg) => tracing::warn!("Skills lookup failed: {msg}"),
            PipelineError::ValidationFailed(_) => {}
        }

        (self.status_code(), Json(self.body())).into_response()
    }
}
