/*!
Error types for the Snapvault core engine.
*/

use thiserror::Error;

/// Result type used throughout the Snapvault core.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors that can occur during snapshot operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot capture aborted; history is left unchanged
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// Restore target missing or unparseable; live state is left untouched
    #[error("Restore failed: {0}")]
    RestoreFailed(String),

    /// Malformed import file
    #[error("Import parse failed: {0}")]
    ImportParse(String),

    /// Record store adapter errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

impl VaultError {
    /// Create a new capture error
    pub fn capture<S: Into<String>>(msg: S) -> Self {
        Self::CaptureFailed(msg.into())
    }

    /// Create a new restore error
    pub fn restore<S: Into<String>>(msg: S) -> Self {
        Self::RestoreFailed(msg.into())
    }

    /// Create a new import parse error
    pub fn import_parse<S: Into<String>>(msg: S) -> Self {
        Self::ImportParse(msg.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
}
