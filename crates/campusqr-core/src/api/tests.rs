//! Tests for the attendance API client and types.

#![allow(clippy::unwrap_used)]

use super::client::{ApiClient, ApiError};
use super::types::{LabSessionCreated, LabSessionRoster, ManualAction, MarkRequest, StudentLogin, StudentProfile};
use super::{MarkRejection, classify_mark_status};
use crate::config::ApiConfig;
use crate::token::{FieldValue, TokenKind};

fn config(base_url: &str) -> ApiConfig {
    ApiConfig {
        base_url: base_url.into(),
        ..ApiConfig::default()
    }
}

// =============================================================================
// Client construction tests
// =============================================================================

#[test]
fn empty_base_url_returns_config_error() {
    let err = ApiClient::new(&config("")).unwrap_err();
    assert!(matches!(err, ApiError::Config(_)));
}

#[test]
fn trailing_slash_stripped_from_base_url() {
    let client = ApiClient::new(&config("https://campus.example/")).unwrap();
    assert_eq!(
        client.api_url("/api/attendance/mark"),
        "https://campus.example/api/attendance/mark"
    );
}

#[test]
fn id_segment_is_escaped() {
    let client = ApiClient::new(&config("https://campus.example/")).unwrap();
    let url = client.api_url_with_id("/api/student/me", "STU-001").unwrap();
    assert_eq!(url.as_str(), "https://campus.example/api/student/me/STU-001");
    let url = client.api_url_with_id("/api/lab-attendance/session", "a/b c").unwrap();
    assert_eq!(url.path(), "/api/lab-attendance/session/a%2Fb%20c");
}

// =============================================================================
// Status classification
// =============================================================================

#[test]
fn success_codes_accept() {
    assert_eq!(classify_mark_status(200, None), Ok(()));
    assert_eq!(classify_mark_status(201, None), Ok(()));
}

#[test]
fn conflict_is_duplicate() {
    assert_eq!(
        classify_mark_status(409, Some("Already marked".into())),
        Err(MarkRejection::Conflict)
    );
}

#[test]
fn forbidden_keeps_backend_message() {
    assert_eq!(
        classify_mark_status(403, Some("Not enrolled in this lab".into())),
        Err(MarkRejection::Forbidden {
            message: "Not enrolled in this lab".into()
        })
    );
    assert!(matches!(
        classify_mark_status(403, None),
        Err(MarkRejection::Forbidden { .. })
    ));
}

#[test]
fn unknown_codes_are_failures_not_success() {
    for status in [301, 400, 404, 418, 500, 503] {
        assert!(matches!(
            classify_mark_status(status, None),
            Err(MarkRejection::Failed { .. })
        ));
    }
}

// =============================================================================
// Serialization
// =============================================================================

#[test]
fn theory_mark_body_has_no_batch() {
    let req = MarkRequest {
        kind: TokenKind::Attendance,
        session_id: "S1".into(),
        student_id: "STU1".into(),
        student_year: "2".into(),
        student_division: "B".into(),
        student_batch: None,
    };
    assert_eq!(req.path(), "/api/attendance/mark");
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "sessionId": "S1",
            "studentId": "STU1",
            "studentYear": "2",
            "studentDivision": "B"
        })
    );
}

#[test]
fn lab_mark_body_has_batch() {
    let req = MarkRequest {
        kind: TokenKind::LabAttendance,
        session_id: "L1".into(),
        student_id: "STU1".into(),
        student_year: "2".into(),
        student_division: "B".into(),
        student_batch: Some("B1".into()),
    };
    assert_eq!(req.path(), "/api/lab-attendance/mark");
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["studentBatch"], "B1");
    assert!(json.get("kind").is_none());
}

#[test]
fn manual_paths_per_kind() {
    assert_eq!(
        ManualAction::Add.path(TokenKind::Attendance),
        "/api/attendance/manual/add"
    );
    assert_eq!(
        ManualAction::Remove.path(TokenKind::LabAttendance),
        "/api/lab-attendance/manual/remove"
    );
}

// =============================================================================
// Deserialization
// =============================================================================

#[test]
fn deserialize_profile_with_numeric_year() {
    let json = r#"{"id":"STU1","name":"Asha","year":2,"division":"B","subBranch":"B1"}"#;
    let profile: StudentProfile = serde_json::from_str(json).unwrap();
    assert_eq!(profile.year, FieldValue::Number(2));
    assert_eq!(profile.division.normalized(), "B");
    assert_eq!(profile.sub_branch.unwrap().normalized(), "B1");
}

#[test]
fn deserialize_profile_without_batch() {
    let json = r#"{"year":"3","division":"A"}"#;
    let profile: StudentProfile = serde_json::from_str(json).unwrap();
    assert!(profile.sub_branch.is_none());
}

#[test]
fn deserialize_login() {
    let json = r#"{"success":true,"id":"STU1","year":2,"division":"B","name":"Asha"}"#;
    let login: StudentLogin = serde_json::from_str(json).unwrap();
    assert!(login.success);
    assert_eq!(login.id.as_deref(), Some("STU1"));
}

#[test]
fn deserialize_lab_session_created() {
    let json = r#"{"sessionId":"L-42","expiresAt":"2026-01-01T10:00:00Z"}"#;
    let created: LabSessionCreated = serde_json::from_str(json).unwrap();
    assert_eq!(created.session_id, "L-42");
    assert!(created.expires_at.is_some());
}

#[test]
fn deserialize_roster_defaults_to_empty() {
    let roster: LabSessionRoster = serde_json::from_str("{}").unwrap();
    assert!(roster.present_students.is_empty());
}
