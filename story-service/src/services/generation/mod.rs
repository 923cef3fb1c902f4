//! Generation client abstraction.
//!
//! The handler only sees [`GenerationClient`]; the concrete client is built
//! once at startup and injected through `AppState`, so tests can swap in
//! [`mock::MockGenerationClient`].

pub mod gemini;
pub mod mock;

use crate::models::GenerationRequest;
use async_trait::async_trait;
use service_core::error::AppError;
use thiserror::Error;

pub use gemini::GeminiClient;
pub use mock::MockGenerationClient;

/// Error type for generation calls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Generation client not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The safety policy withheld the prompt or the output.
    #[error("Content generation blocked due to: {0}")]
    ContentBlocked(String),

    #[error("Generation API returned no usable content")]
    EmptyResponse,

    #[error("Generation API error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("Generation API unreachable: {0}")]
    Unavailable(String),
}

impl GenerationError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::NotConfigured(_) => "not_configured",
            GenerationError::InvalidRequest(_) => "invalid_request",
            GenerationError::ContentBlocked(_) => "content_blocked",
            GenerationError::EmptyResponse => "empty_response",
            GenerationError::Upstream { .. } => "upstream_error",
            GenerationError::Unavailable(_) => "unavailable",
        }
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::InvalidRequest(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            GenerationError::NotConfigured(reason) => AppError::Upstream {
                error: "Gemini client is not configured. Check API key and model.".to_string(),
                details: Some(reason),
            },
            GenerationError::ContentBlocked(reason) => AppError::Upstream {
                error: format!("Content generation blocked due to: {}", reason),
                details: Some(reason),
            },
            GenerationError::EmptyResponse => AppError::Upstream {
                error: "Failed to generate content: Unexpected API response structure."
                    .to_string(),
                details: None,
            },
            GenerationError::Upstream { message, .. } | GenerationError::Unavailable(message) => {
                AppError::Upstream {
                    error: "Failed to generate content from Gemini API.".to_string(),
                    details: Some(message),
                }
            }
        }
    }
}

/// Produces story text for a prompt, optionally continuing a conversation.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Whether the client has what it needs to call the API.
    fn readiness(&self) -> Result<(), GenerationError>;

    /// Generate text for the newest turn. One call, no retries, no streaming.
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn invalid_request_maps_to_bad_request() {
        let err: AppError = GenerationError::InvalidRequest("Prompt is required.".into()).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn content_blocked_keeps_reason_verbatim() {
        let err: AppError = GenerationError::ContentBlocked("SAFETY".into()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        match err {
            AppError::Upstream { error, details } => {
                assert_eq!(error, "Content generation blocked due to: SAFETY");
                assert_eq!(details.as_deref(), Some("SAFETY"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn upstream_failures_surface_vendor_message() {
        let err: AppError = GenerationError::Upstream {
            status: Some(400),
            message: "API key not valid.".into(),
        }
        .into();
        match err {
            AppError::Upstream { details, .. } => {
                assert_eq!(details.as_deref(), Some("API key not valid."))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn kinds_are_stable_labels() {
        assert_eq!(GenerationError::EmptyResponse.kind(), "empty_response");
        assert_eq!(
            GenerationError::Unavailable("timeout".into()).kind(),
            "unavailable"
        );
    }
}
