use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::pipeline::schema::ValidationIssue;

/// Discriminant of an [`AiError`], used for dispatch and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AiErrorKind {
    Config,
    Api,
    Validation,
    RateLimit,
    Search,
    Timeout,
}

impl fmt::Display for AiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AiErrorKind::Config => "config",
            AiErrorKind::Api => "api",
            AiErrorKind::Validation => "validation",
            AiErrorKind::RateLimit => "rate_limit",
            AiErrorKind::Search => "search",
            AiErrorKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Failure surface shared by the LLM client, the search client and every pipeline.
///
/// Retry policy dispatches on the variant, never on message text:
/// `RateLimit`, `Timeout` and `Api` are transient; `Config`, `Validation`
/// and `Search` are not.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AiError {
    /// Missing or rejected credentials. A deployment defect, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("upstream API error{}: {message}", status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Api { status: Option<u16>, message: String },

    /// Structured output that failed its schema even after coercion.
    #[error("validation error: {message}")]
    Validation {
        message: String,
        issues: Vec<ValidationIssue>,
    },

    #[error("rate limited: {message}")]
    RateLimit {
        message: String,
        retry_after_ms: Option<u64>,
    },

    /// Raised only when every query of a search fan-out failed.
    #[error("search error: {0}")]
    Search(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

impl AiError {
    pub fn api(message: impl Into<String>) -> Self {
        AiError::Api {
            status: None,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AiError::Validation {
            message: message.into(),
            issues: Vec::new(),
        }
    }

    pub fn kind(&self) -> AiErrorKind {
        match self {
            AiError::Config(_) => AiErrorKind::Config,
            AiError::Api { .. } => AiErrorKind::Api,
            AiError::Validation { .. } => AiErrorKind::Validation,
            AiError::RateLimit { .. } => AiErrorKind::RateLimit,
            AiError::Search(_) => AiErrorKind::Search,
            AiError::Timeout(_) => AiErrorKind::Timeout,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::Api { .. } | AiError::RateLimit { .. } | AiError::Timeout(_)
        )
    }

    /// Server-provided wait hint, only ever present on `RateLimit`.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            AiError::RateLimit { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Ai(err) => {
                match err.kind() {
                    AiErrorKind::Validation | AiErrorKind::RateLimit => {
                        tracing::warn!(kind = %err.kind(), "Generation failed: {err}")
                    }
                    _ => tracing::error!(kind = %err.kind(), "Generation failed: {err}"),
                }
                match err {
                    AiError::Validation { .. } => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "GENERATION_INVALID",
                        "The model produced output that does not satisfy the contract".to_string(),
                    ),
                    AiError::RateLimit { .. } => (
                        StatusCode::TOO_MANY_REQUESTS,
                        "RATE_LIMITED",
                        "The model provider is rate limiting requests".to_string(),
                    ),
                    AiError::Timeout(_) => (
                        StatusCode::GATEWAY_TIMEOUT,
                        "UPSTREAM_TIMEOUT",
                        "The model provider did not respond in time".to_string(),
                    ),
                    AiError::Api { .. } => (
                        StatusCode::BAD_GATEWAY,
                        "LLM_ERROR",
                        "An AI processing error occurred".to_string(),
                    ),
                    AiError::Search(_) => (
                        StatusCode::BAD_GATEWAY,
                        "SEARCH_ERROR",
                        "Web research is currently unavailable".to_string(),
                    ),
                    AiError::Config(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "CONFIGURATION_ERROR",
                        "The service is misconfigured".to_string(),
                    ),
                }
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
