use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NotFound,
    Internal,
    Unexpected,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            404 => Self::NotFound,
            500..=599 => Self::Internal,
            _ => Self::Unexpected,
        }
    }
}

/// Error body returned by the hub: `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} (HTTP {status})")]
pub struct ApiError {
    pub code: ErrorCode,
    pub status: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::from_status(status),
            status,
            message: message.into(),
        }
    }

    /// Builds the error from a raw response body, falling back to a generic
    /// message when the body is not the usual `{"error": ..}` shape.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self::new(status, parsed.error),
            Err(_) if body.trim().is_empty() => Self::new(status, "Unknown error"),
            Err(_) => Self::new(status, body.trim()),
        }
    }
}
