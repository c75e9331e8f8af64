//! Common error types for gateway-linked microservices.
//!
//! This crate provides unified error handling across the link and the
//! services that call through it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Application-level errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Call error: {0}")]
    Call(#[from] CallError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of a single outbound call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// Connection failure, decode failure or a fault inside the operation.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx response. `body` is the decoded JSON, or the raw text as a
    /// JSON string when the body was not JSON.
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: Value },

    /// The blocking deadline elapsed before the operation completed.
    #[error("Call timed out")]
    Timeout,
}

impl CallError {
    /// Whether the remote side answered at all.
    pub fn is_http(&self) -> bool {
        matches!(self, CallError::Http { .. })
    }
}

/// Missing or malformed discovery input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Missing configuration value: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Error response for API clients.
///
/// Serializes as `{"code": 404, "text": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP-style status code
    pub code: u16,
    /// Human-readable error message
    pub text: String,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(code: u16, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
        }
    }

    /// Render as a JSON value.
    pub fn to_json(&self) -> Value {
        serde_json::json!({ "code": self.code, "text": self.text })
    }
}

impl From<&CallError> for ErrorResponse {
    fn from(err: &CallError) -> Self {
        match err {
            // Slow and unreachable look the same to callers.
            CallError::Transport(_) | CallError::Timeout => {
                Self::new(503, "remote endpoint unavailable")
            }
            CallError::Http { status, body } => {
                let text = match body {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Self::new(*status, text)
            }
        }
    }
}

impl From<CallError> for ErrorResponse {
    fn from(err: CallError) -> Self {
        Self::from(&err)
    }
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::Call(e) => e.into(),
            AppError::Config(e) => Self::new(500, e.to_string()),
            AppError::Validation(msg) => Self::new(400, msg.clone()),
            AppError::NotFound(msg) => Self::new(404, msg.clone()),
            AppError::Internal(msg) => Self::new(500, msg.clone()),
        }
    }
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;
