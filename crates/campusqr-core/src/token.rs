//! Attendance token: the JSON payload carried by a rotating QR code.
//!
//! Wire format (UTF-8 JSON, field order as emitted):
//!
//! ```text
//! {"type":"ATTENDANCE_QR","sessionId":"S1","issuedAt":1700000000000}
//! {"type":"LAB_ATTENDANCE_QR","sessionId":"S2","year":2,"division":"B","batch":"C1","issuedAt":1700000000000}
//! ```
//!
//! Payloads are not signed. The backend remains the trust boundary for
//! session validity, duplicates and authorization.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token flavour, serialized as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Theory class attendance.
    #[serde(rename = "ATTENDANCE_QR")]
    Attendance,
    /// Lab attendance, restricted to one batch of a division.
    #[serde(rename = "LAB_ATTENDANCE_QR")]
    LabAttendance,
}

impl TokenKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attendance => "ATTENDANCE_QR",
            Self::LabAttendance => "LAB_ATTENDANCE_QR",
        }
    }

    fn from_wire(s: &str) -> Option<Self> {
        match s {
            "ATTENDANCE_QR" => Some(Self::Attendance),
            "LAB_ATTENDANCE_QR" => Some(Self::LabAttendance),
            _ => None,
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A class identifier that may arrive as a JSON number or string.
///
/// Comparisons go through [`fmt::Display`], so `2` and `"2"` are equal
/// once normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(i64),
    Text(String),
}

impl FieldValue {
    pub fn normalized(&self) -> String {
        self.to_string()
    }

    fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Year, division and batch a lab session is restricted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabClass {
    pub year: FieldValue,
    pub division: FieldValue,
    pub batch: FieldValue,
}

/// Reasons a raw payload is not a usable token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("payload is not a JSON token object: {0}")]
    NotJson(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unknown token type `{0}`")]
    UnknownType(String),
}

/// One attendance-marking opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub division: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<FieldValue>,
    /// Unix milliseconds at generation.
    pub issued_at: i64,
}

/// Lenient decoding target; required fields are checked afterwards so
/// that absence and wrong JSON types both surface as `TokenError`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawToken {
    #[serde(rename = "type")]
    kind: Option<String>,
    session_id: Option<FieldValue>,
    year: Option<FieldValue>,
    division: Option<FieldValue>,
    batch: Option<FieldValue>,
    issued_at: Option<i64>,
}

impl Token {
    /// Theory token.
    pub fn attendance(session_id: impl Into<String>, issued_at: i64) -> Self {
        Self {
            kind: TokenKind::Attendance,
            session_id: session_id.into(),
            year: None,
            division: None,
            batch: None,
            issued_at,
        }
    }

    /// Lab token bound to one batch.
    pub fn lab(session_id: impl Into<String>, class: LabClass, issued_at: i64) -> Self {
        Self {
            kind: TokenKind::LabAttendance,
            session_id: session_id.into(),
            year: Some(class.year),
            division: Some(class.division),
            batch: Some(class.batch),
            issued_at,
        }
    }

    /// Decode and validate a scanned payload.
    pub fn parse(raw: &str) -> Result<Self, TokenError> {
        let raw: RawToken =
            serde_json::from_str(raw.trim()).map_err(|e| TokenError::NotJson(e.to_string()))?;

        let kind_str = raw
            .kind
            .filter(|k| !k.is_empty())
            .ok_or(TokenError::MissingField("type"))?;
        let session_id = raw
            .session_id
            .filter(|s| !s.is_blank())
            .ok_or(TokenError::MissingField("sessionId"))?
            .normalized();
        let issued_at = raw
            .issued_at
            .filter(|t| *t > 0)
            .ok_or(TokenError::MissingField("issuedAt"))?;
        let kind = TokenKind::from_wire(&kind_str).ok_or(TokenError::UnknownType(kind_str))?;

        Ok(Self {
            kind,
            session_id,
            year: raw.year,
            division: raw.division,
            batch: raw.batch,
            issued_at,
        })
    }

    /// Serialize to the string encoded into the QR symbol.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Milliseconds elapsed between issuance and `now_ms`.
    pub const fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.issued_at)
    }
}

/// Maximum accepted token age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessWindow {
    max_age_ms: i64,
}

impl FreshnessWindow {
    pub const DEFAULT_MS: i64 = 10_000;

    pub const fn new(max_age_ms: i64) -> Self {
        Self { max_age_ms }
    }

    pub const fn max_age_ms(self) -> i64 {
        self.max_age_ms
    }

    /// A token is fresh while its age does not exceed the window.
    /// Tokens stamped slightly in the future (clock skew) are accepted.
    pub const fn is_fresh(self, token: &Token, now_ms: i64) -> bool {
        token.age_ms(now_ms) <= self.max_age_ms
    }
}

impl Default for FreshnessWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MS)
    }
}
