//! Error types for the firmware core
//!
//! None of these ever reach the peer. Handlers log them and fall back to the
//! unauthenticated state.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("counter-mode cipher used before init")]
    NotInitialized,
    #[error("block cipher backend unavailable: {0}")]
    BackendUnavailable(String),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NonceError {
    #[error("random source failed: {0}")]
    Source(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
