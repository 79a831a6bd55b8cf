use thiserror::Error;

use crate::service::ServiceError;

#[derive(Debug, Error)]
pub enum JobwaitError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Job service error: {0}")]
    Service(#[from] ServiceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Invalid or missing session settings, raised when a session is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{field} must be set")]
    Missing { field: &'static str },

    #[error("{field} must be >= 0 (got {value})")]
    Negative { field: &'static str, value: i64 },

    #[error("max_attempts must be >= 1 (got {0})")]
    InvalidMaxAttempts(i64),

    #[error("invalid retry token '{0}' (expected one of never, always, retryable, exhausted, generic)")]
    InvalidRetryToken(String),

    #[error("retry policy '{0}' combines never, always or retryable with other tokens")]
    ConflictingRetryTokens(String),
}
