//! Error type shared by the collaborators and the reconciler.
//!
//! Transport failures are not retried here. They end the current sweep and
//! the driver starts over on the next one.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    /// Transport failure or non-success status from a remote API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML or misses a required key
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WatchError {
    pub fn config(message: impl Into<String>) -> Self {
        WatchError::Config(message.into())
    }
}

pub type WatchResult<T> = Result<T, WatchError>;
