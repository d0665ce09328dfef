use shared::error::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    /// 2xx response whose body did not report `status: ok`.
    #[error("{0}")]
    Rejected(String),
    #[error("invalid server url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("realtime transport has shut down")]
    Closed,
    #[error("failed to encode outbound event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invalid realtime url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}
