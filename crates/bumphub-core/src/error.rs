//! Error type shared by all BumpHub crates.

use chrono::Duration;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, BumpHubError>;

/// Errors produced by the engine and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum BumpHubError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Manual bump rejected — the member is still inside the cooldown
    /// window. Carries the remaining time for the user-facing message.
    #[error("Cooldown active: {} left", crate::cooldown::format_remaining(.remaining))]
    CooldownActive { remaining: Duration },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BumpHubError {
    /// Whether this error should abort a whole pass (as opposed to a
    /// single item). Only store access counts as fatal; dispatch and
    /// per-item errors are recovered locally.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BumpHubError::Store(_) | BumpHubError::Config(_))
    }
}
