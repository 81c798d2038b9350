use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;

/// Problems with the provider configuration. Detected once at startup and
/// reported on every request that needs a live provider.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PROVIDER is not set; expected one of groq, openrouter, openai")]
    MissingProvider,
    #[error("unknown PROVIDER '{0}'; expected one of groq, openrouter, openai")]
    UnknownProvider(String),
    #[error("{env} is not set for provider {provider}")]
    MissingApiKey { provider: &'static str, env: &'static str },
    #[error("invalid value '{value}' for {var}")]
    InvalidValue { var: &'static str, value: String },
}

/// Failures of the outbound provider call. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("provider request timed out: {0}")]
    Timeout(String),
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider responded with status {status}")]
    Status { status: u16 },
    #[error("malformed provider reply: {0}")]
    MalformedReply(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout(err.to_string())
        } else if err.is_decode() {
            UpstreamError::MalformedReply(err.to_string())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub field: String,
    pub issue: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: ErrorPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: Vec::new(),
            request_id: request_id.into(),
        }
    }

    pub fn with_details(mut self, details: Vec<ErrorDetail>) -> Self {
        self.details = details;
        self
    }

    pub fn from_config(err: &ConfigError, request_id: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "CONFIG_ERROR",
            format!("server misconfiguration: {}", err),
            request_id,
        )
    }

    pub fn from_upstream(err: &UpstreamError, request_id: impl Into<String>) -> Self {
        let (status, code) = match err {
            UpstreamError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT"),
            UpstreamError::Transport(_)
            | UpstreamError::Status { .. }
            | UpstreamError::MalformedReply(_) => (StatusCode::BAD_GATEWAY, "LLM_UPSTREAM_ERROR"),
        };
        Self::new(status, code, err.to_string(), request_id)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let payload = ErrorBody {
            error: ErrorPayload {
                code: self.code,
                message: self.message,
                details: self.details,
                request_id: self.request_id,
            },
        };
        (self.status, Json(payload)).into_response()
    }
}
