//! Request and response bodies of the attendance backend.

use serde::{Deserialize, Serialize};

use crate::token::{FieldValue, TokenKind};

/// Body of `POST /api/attendance/mark` and `POST /api/lab-attendance/mark`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRequest {
    #[serde(skip)]
    pub kind: TokenKind,
    pub session_id: String,
    pub student_id: String,
    pub student_year: String,
    pub student_division: String,
    /// Lab requests only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_batch: Option<String>,
}

impl MarkRequest {
    pub const fn path(&self) -> &'static str {
        match self.kind {
            TokenKind::Attendance => "/api/attendance/mark",
            TokenKind::LabAttendance => "/api/lab-attendance/mark",
        }
    }
}

/// Subset of `GET /api/student/me/{studentId}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub year: FieldValue,
    pub division: FieldValue,
    /// Lab batch label, e.g. "C1".
    #[serde(default)]
    pub sub_branch: Option<FieldValue>,
}

/// Response of `POST /api/auth/student/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentLogin {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub year: Option<FieldValue>,
    #[serde(default)]
    pub division: Option<FieldValue>,
}

/// Body of `POST /api/lab-attendance/session/create`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabSessionRequest {
    pub teacher_id: String,
    pub year: FieldValue,
    pub division: FieldValue,
    pub batch: FieldValue,
    pub subject: String,
}

/// Response of `POST /api/lab-attendance/session/create`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabSessionCreated {
    pub session_id: String,
    #[serde(default)]
    pub expires_at: Option<serde_json::Value>,
}

/// Response of `GET /api/lab-attendance/session/{sessionId}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabSessionRoster {
    #[serde(default)]
    pub present_students: Vec<String>,
}

/// Manual attendance edit by the teacher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualAction {
    Add,
    Remove,
}

impl ManualAction {
    pub const fn path(self, kind: TokenKind) -> &'static str {
        match (kind, self) {
            (TokenKind::Attendance, Self::Add) => "/api/attendance/manual/add",
            (TokenKind::Attendance, Self::Remove) => "/api/attendance/manual/remove",
            (TokenKind::LabAttendance, Self::Add) => "/api/lab-attendance/manual/add",
            (TokenKind::LabAttendance, Self::Remove) => "/api/lab-attendance/manual/remove",
        }
    }
}

/// Body shared by the manual edit and session delete endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionStudentBody<'a> {
    pub session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<&'a str>,
}

/// Error body returned by the backend on failures.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.msg.or(self.message).filter(|m| !m.is_empty())
    }
}
