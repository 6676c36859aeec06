//! Error types for the `CampusQR` core library.

use thiserror::Error;

use crate::api::ApiError;

/// Result type alias using the `CampusQR` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `CampusQR` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local key-value storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// No student is signed in on this device
    #[error("No student ID stored; log in first")]
    MissingStudentId,

    /// Manual attendance edits are locked once the session is too old
    #[error("Edit window closed for session {session_id}")]
    EditWindowClosed { session_id: String },

    /// REST backend error
    #[error(transparent)]
    Api(#[from] ApiError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
