use fundlayer_core::{CacheAccessError, ConfigError, FetchError, StoreError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("source manifest '{path}' does not exist")]
    MissingManifest { path: String },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheAccessError),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Config(_) | Self::MissingManifest { .. } => 2,
            Self::Fetch(error) => match error {
                FetchError::Configuration { .. } | FetchError::Validation(_) => 2,
                FetchError::AllSourcesExhausted { .. } | FetchError::Cancelled { .. } => 3,
                FetchError::Decode { .. } => 4,
            },
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
            Self::Store(_) | Self::Cache(_) => 11,
        }
    }
}
