//! Unified error types for the watcher
//!
//! The taxonomy matters more than the payloads: `Auth` is fatal for its
//! account, `Transport` is retried with backoff, and the per-message
//! variants (`Parse`, `Relocation`) never abort a batch or scan.

use thiserror::Error;

/// Error type shared by every component of the watcher.
#[derive(Debug, Clone, Error)]
pub enum WatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Relocation failed: {0}")]
    Relocation(String),

    #[error("Watermark persistence failed: {0}")]
    Persistence(String),
}

impl WatchError {
    /// Authentication failures never self-heal by retrying; everything
    /// else on the connection surface is worth another attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, WatchError::Auth(_) | WatchError::Config(_))
    }
}

// Implement From for common error types

impl From<toml::de::Error> for WatchError {
    fn from(err: toml::de::Error) -> Self {
        WatchError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for WatchError {
    fn from(err: serde_json::Error) -> Self {
        WatchError::Persistence(err.to_string())
    }
}

/// Result type alias using WatchError
pub type Result<T> = std::result::Result<T, WatchError>;
