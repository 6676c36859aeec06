//! Attendance backend REST client.
//!
//! Uses reqwest to call the mark, profile, login and lab-session endpoints.

use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::types::{
    ErrorBody, LabSessionCreated, LabSessionRequest, LabSessionRoster, ManualAction, MarkRequest,
    SessionStudentBody, StudentLogin, StudentProfile,
};
use super::{AttendanceBackend, MarkRejection, ProfileSource, classify_mark_status};
use crate::config::ApiConfig;
use crate::token::TokenKind;

/// API client errors.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// REST client for the attendance backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new client.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        // reqwest is built with rustls-no-provider; an `Err` here only means a
        // provider was already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Self::with_http_client(&config.base_url, http)
    }

    /// Wrap an already configured `reqwest::Client`.
    pub fn with_http_client(base_url: &str, http: reqwest::Client) -> Result<Self, ApiError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::Config("base_url is empty".into()));
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the absolute URL for an `/api/...` path.
    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL for `path` with one user-supplied ID appended as an escaped
    /// path segment.
    pub(crate) fn api_url_with_id(&self, path: &str, id: &str) -> Result<reqwest::Url, ApiError> {
        let mut url = reqwest::Url::parse(&self.api_url(path))
            .map_err(|e| ApiError::Config(format!("invalid base_url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Config("base_url cannot carry a path".into()))?
            .push(id);
        Ok(url)
    }

    async fn error_message(resp: reqwest::Response) -> Option<String> {
        resp.json::<ErrorBody>()
            .await
            .ok()
            .and_then(ErrorBody::into_message)
    }

    /// Pass successful responses through, turn the rest into `ApiError::Api`.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = Self::error_message(resp)
            .await
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").into());
        Err(ApiError::Api {
            status: status.as_u16(),
            message,
        })
    }

    // =========================================================================
    // Attendance marking
    // =========================================================================

    /// Submit a mark request and classify the response.
    #[instrument(skip(self, request), fields(session_id = %request.session_id, kind = %request.kind))]
    pub async fn mark_attendance(&self, request: &MarkRequest) -> Result<(), MarkRejection> {
        let url = self.api_url(request.path());
        let resp = match self.http.post(&url).json(request).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, timeout = e.is_timeout(), "Mark request did not complete");
                let message = if e.is_timeout() {
                    "Request timed out".to_string()
                } else {
                    e.to_string()
                };
                return Err(MarkRejection::Failed { message });
            }
        };

        let status = resp.status();
        debug!(status = status.as_u16(), "Mark response received");
        let message = if status.is_success() {
            None
        } else {
            Self::error_message(resp).await
        };
        classify_mark_status(status.as_u16(), message)
    }

    // =========================================================================
    // Student
    // =========================================================================

    /// Fetch the authoritative student profile.
    #[instrument(skip(self))]
    pub async fn student_profile(&self, student_id: &str) -> Result<StudentProfile, ApiError> {
        let url = self.api_url_with_id("/api/student/me", student_id)?;
        let resp = Self::check_status(self.http.get(url).send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Student sign-in. Fails with `InvalidCredentials` unless the backend
    /// reports success with an ID.
    #[instrument(skip(self, password))]
    pub async fn student_login(&self, id: &str, password: &str) -> Result<StudentLogin, ApiError> {
        let url = self.api_url("/api/auth/student/login");
        let body = serde_json::json!({ "id": id, "password": password });
        let resp = self.http.post(&url).json(&body).send().await?;
        if matches!(resp.status().as_u16(), 400 | 401 | 404) {
            return Err(ApiError::InvalidCredentials);
        }
        let login: StudentLogin = Self::check_status(resp).await?.json().await?;
        if !login.success || login.id.as_deref().is_none_or(str::is_empty) {
            return Err(ApiError::InvalidCredentials);
        }
        Ok(login)
    }

    // =========================================================================
    // Lab sessions
    // =========================================================================

    /// Open a lab session; the returned ID seeds the emitter.
    #[instrument(skip(self, request), fields(subject = %request.subject))]
    pub async fn create_lab_session(
        &self,
        request: &LabSessionRequest,
    ) -> Result<LabSessionCreated, ApiError> {
        let url = self.api_url("/api/lab-attendance/session/create");
        let resp = Self::check_status(self.http.post(&url).json(request).send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Permanently delete a lab session and its attendance.
    #[instrument(skip(self))]
    pub async fn delete_lab_session(&self, session_id: &str) -> Result<(), ApiError> {
        let url = self.api_url("/api/lab-attendance/session/delete");
        let body = SessionStudentBody {
            session_id,
            student_id: None,
        };
        Self::check_status(self.http.delete(&url).json(&body).send().await?).await?;
        Ok(())
    }

    /// Students currently marked present in a lab session.
    #[instrument(skip(self))]
    pub async fn lab_session(&self, session_id: &str) -> Result<LabSessionRoster, ApiError> {
        let url = self.api_url_with_id("/api/lab-attendance/session", session_id)?;
        let resp = Self::check_status(self.http.get(url).send().await?).await?;
        Ok(resp.json().await?)
    }

    /// Add or remove one student by hand.
    #[instrument(skip(self))]
    pub async fn manual_edit(
        &self,
        kind: TokenKind,
        action: ManualAction,
        session_id: &str,
        student_id: &str,
    ) -> Result<(), ApiError> {
        let url = self.api_url(action.path(kind));
        let body = SessionStudentBody {
            session_id,
            student_id: Some(student_id),
        };
        Self::check_status(self.http.post(&url).json(&body).send().await?).await?;
        Ok(())
    }
}

impl AttendanceBackend for ApiClient {
    async fn mark(&self, request: &MarkRequest) -> Result<(), MarkRejection> {
        self.mark_attendance(request).await
    }
}

impl ProfileSource for ApiClient {
    async fn fetch_profile(&self, student_id: &str) -> Result<StudentProfile, ApiError> {
        self.student_profile(student_id).await
    }
}
