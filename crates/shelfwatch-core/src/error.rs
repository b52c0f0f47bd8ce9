//! Error type shared across the workspace.

use thiserror::Error;

/// All errors produced by shelfwatch components.
///
/// Policy outcomes (already subscribed, location required, cooldown) are NOT
/// errors; they are returned as plain enum values from the registry.
#[derive(Error, Debug)]
pub enum ShelfwatchError {
    /// Configuration file or CLI problems.
    #[error("Config error: {0}")]
    Config(String),

    /// Upstream session handshake or refresh failure.
    #[error("Session error: {0}")]
    Session(String),

    /// Upstream catalog fetch failure (network, status, payload).
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Messaging gateway delivery failure.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Subscription store read/write failure.
    #[error("Store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ShelfwatchError>;
