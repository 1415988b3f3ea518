// world_server_core/server/src/core/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Content error: {0}")]
    ContentError(String),

    #[error("Geometry catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Instance id space exhausted")]
    InstanceIdOverflow,

    #[error("Threading error: {0}")]
    ThreadingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Decoding failures for the binary geometry catalog.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("record truncated: needed {needed} bytes, {available} left")]
    Truncated { needed: usize, available: usize },

    #[error("model name length {0} exceeds limit")]
    NameTooLong(u32),

    #[error("model name is not valid UTF-8")]
    InvalidName,
}

pub type ServerResult<T> = Result<T, ServerError>;
