use thiserror::Error;

use crate::orchestrator::SourceAttempt;

/// Validation errors for request inputs and domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("data type cannot be empty")]
    EmptyDataType,
    #[error("data type '{value}' may only contain ASCII letters, digits, '_' and '-'")]
    InvalidDataType { value: String },

    #[error("parameter name cannot be empty")]
    EmptyParamName,
    #[error("parameter '{value}' must be formatted as key=value")]
    MalformedParam { value: String },

    #[error("source name cannot be empty")]
    EmptySourceName,

    #[error("ttl must be greater than zero")]
    ZeroTtl,

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("payload shape '{value}' is not one of any, array, fields:<a,b>, number:<field>")]
    InvalidShape { value: String },
}

/// Invalid configuration values read from the environment or a manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name}='{value}' is not a valid {expected}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("{field} must not exceed {max_secs} seconds")]
    TooLarge { field: &'static str, max_secs: u64 },

    #[error("failed to read source manifest '{path}': {source}")]
    ManifestIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse source manifest '{path}': {source}")]
    ManifestParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors surfaced to callers of the fetch orchestrator.
///
/// Individual source failures never appear here on their own; they are
/// recorded in the attempt chain and only surface when every source and the
/// cache fallback are exhausted.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No sources are registered for the data type. Not retryable.
    #[error("no sources configured for data type '{data_type}'")]
    Configuration { data_type: String },

    /// Every eligible source failed or was circuit-open and no cached
    /// entry, fresh or stale, exists for the key.
    #[error("all {} source attempt(s) exhausted for '{key}'", attempts.len())]
    AllSourcesExhausted {
        data_type: String,
        key: String,
        attempts: Vec<SourceAttempt>,
    },

    /// The caller cancelled the fetch before it completed.
    #[error("fetch for '{key}' was cancelled")]
    Cancelled { key: String },

    /// A served payload passed validation but does not decode into the
    /// typed shape a wrapper expects.
    #[error("payload for '{data_type}' does not match the expected shape: {source}")]
    Decode {
        data_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl FetchError {
    /// Stable machine-readable code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "fetch.configuration",
            Self::AllSourcesExhausted { .. } => "fetch.all_sources_exhausted",
            Self::Cancelled { .. } => "fetch.cancelled",
            Self::Decode { .. } => "fetch.decode",
            Self::Validation(_) => "fetch.invalid_request",
        }
    }

    /// Whether retrying the same request later can succeed.
    pub const fn retryable(&self) -> bool {
        matches!(self, Self::AllSourcesExhausted { .. } | Self::Cancelled { .. })
    }
}
