//! Attendance backend integration.
//!
//! The scanner and the student cache talk to the backend through the
//! [`AttendanceBackend`] and [`ProfileSource`] traits; [`ApiClient`] is
//! the reqwest implementation of both.

mod client;
pub mod types;

#[cfg(test)]
mod tests;

use std::future::Future;

use thiserror::Error;

pub use client::{ApiClient, ApiError};
pub use types::{
    LabSessionCreated, LabSessionRequest, LabSessionRoster, ManualAction, MarkRequest,
    StudentLogin, StudentProfile,
};

/// Why the backend did not accept a mark request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkRejection {
    /// HTTP 409: the student is already marked for this session.
    #[error("attendance already recorded")]
    Conflict,

    /// HTTP 403, with the backend's explanation.
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// Network error, timeout, 5xx or any unrecognised status.
    #[error("request failed: {message}")]
    Failed { message: String },
}

/// Map a mark response status onto the protocol outcome.
///
/// Only 2xx counts as success; unknown codes are treated as failures.
pub fn classify_mark_status(status: u16, message: Option<String>) -> Result<(), MarkRejection> {
    match status {
        200..=299 => Ok(()),
        409 => Err(MarkRejection::Conflict),
        403 => Err(MarkRejection::Forbidden {
            message: message.unwrap_or_else(|| "Access denied".to_string()),
        }),
        _ => Err(MarkRejection::Failed {
            message: message.unwrap_or_else(|| format!("HTTP {status}")),
        }),
    }
}

/// Where mark requests are submitted.
pub trait AttendanceBackend {
    fn mark(&self, request: &MarkRequest)
    -> impl Future<Output = Result<(), MarkRejection>> + Send;
}

/// Where the authoritative student profile comes from.
pub trait ProfileSource {
    fn fetch_profile(
        &self,
        student_id: &str,
    ) -> impl Future<Output = Result<StudentProfile, ApiError>> + Send;
}
