//! CLI error types.

use thiserror::Error;

/// CLI errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] eavsetup_core::Error),

    /// Upgrade error.
    #[error("upgrade failed: {0}")]
    Migration(#[from] eavsetup_core::MigrationError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Output encoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
