//! Student-side scanner: validates a scanned token and submits it.
//!
//! States:
//!
//! ```text
//! Idle --scan--> Locked --local check fails--------------> Resolved(error)
//!                   \----submit--> backend --response----> Resolved(success | error)
//! Resolved --reset (manual, or cooldown for expired/failed)--> Idle
//! ```
//!
//! Camera callbacks arrive one at a time. The lock is checked and set in
//! [`Scanner::accept`], which never suspends, so a burst of frames of
//! the same code produces at most one submission. While a submission is
//! outstanding the scanner stays `Locked` and further scans are ignored.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{AttendanceBackend, MarkRejection, MarkRequest, ProfileSource};
use crate::clock::Clock;
use crate::config::ScannerConfig;
use crate::storage::KeyValueStore;
use crate::student::StudentContextCache;
use crate::token::{FreshnessWindow, Token, TokenKind};

/// Closed set of reasons a scan does not mark attendance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanFailure {
    /// Not JSON, missing `type`/`sessionId`/`issuedAt`, or unknown type.
    #[error("This QR is not generated by your teacher ({reason})")]
    MalformedPayload { reason: String },

    /// Older than the freshness window.
    #[error("QR is {age_ms} ms old; scan the latest QR")]
    ExpiredToken { age_ms: i64 },

    /// Local class/batch check or backend 403.
    #[error("{message}")]
    AuthorizationMismatch { message: String },

    /// Backend 409.
    #[error("Attendance already recorded")]
    DuplicateSubmission,

    /// Network, timeout, 5xx or any other status.
    #[error("{message}")]
    TransientFailure { message: String },
}

impl ScanFailure {
    /// Stable user-facing error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedPayload { .. } => "invalid",
            Self::ExpiredToken { .. } => "expired",
            Self::AuthorizationMismatch { .. } => "forbidden",
            Self::DuplicateSubmission => "already-marked",
            Self::TransientFailure { .. } => "failed",
        }
    }

    pub const fn title(&self) -> &'static str {
        match self {
            Self::MalformedPayload { .. } => "Invalid QR",
            Self::ExpiredToken { .. } => "QR Expired",
            Self::AuthorizationMismatch { .. } => "Access Denied",
            Self::DuplicateSubmission => "Already Marked",
            Self::TransientFailure { .. } => "Attendance Failed",
        }
    }

    /// Whether the scanner unlocks by itself after the cooldown.
    pub const fn auto_resets(&self) -> bool {
        matches!(self, Self::ExpiredToken { .. } | Self::TransientFailure { .. })
    }
}

impl From<MarkRejection> for ScanFailure {
    fn from(rejection: MarkRejection) -> Self {
        match rejection {
            MarkRejection::Conflict => Self::DuplicateSubmission,
            MarkRejection::Forbidden { message } => Self::AuthorizationMismatch { message },
            MarkRejection::Failed { message } => Self::TransientFailure { message },
        }
    }
}

/// Terminal result of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Marked { kind: TokenKind, session_id: String },
    Rejected(ScanFailure),
}

impl ScanOutcome {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Marked { .. } => "success",
            Self::Rejected(failure) => failure.code(),
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Marked { .. })
    }

    pub const fn auto_resets(&self) -> bool {
        match self {
            Self::Marked { .. } => false,
            Self::Rejected(failure) => failure.auto_resets(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Marked {
                kind: TokenKind::Attendance,
                ..
            } => "Attendance Marked",
            Self::Marked {
                kind: TokenKind::LabAttendance,
                ..
            } => "Lab Attendance Marked",
            Self::Rejected(failure) => failure.title(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Marked {
                kind: TokenKind::Attendance,
                ..
            } => "You are marked present for this class.".to_string(),
            Self::Marked {
                kind: TokenKind::LabAttendance,
                ..
            } => "You are marked present for this lab.".to_string(),
            Self::Rejected(failure) => failure.to_string(),
        }
    }
}

/// Scanner lock state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    /// Camera active, accepting scans.
    Idle,
    /// A scan is being processed.
    Locked,
    /// Showing the result of the last scan.
    Resolved { outcome: ScanOutcome, at_ms: i64 },
}

/// A validated scan awaiting the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMark {
    token: Token,
    request: MarkRequest,
}

impl PendingMark {
    pub const fn token(&self) -> &Token {
        &self.token
    }

    pub const fn request(&self) -> &MarkRequest {
        &self.request
    }
}

/// Result of handing a raw payload to the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The lock was engaged; the payload was dropped.
    Ignored,
    /// Rejected locally without a network call.
    Resolved(ScanOutcome),
    /// Passed local checks; submit `request()` to the backend, then call
    /// [`Scanner::resolve`].
    Submit(PendingMark),
}

/// QR attendance scanner for one screen lifetime.
#[derive(Debug)]
pub struct Scanner<S, C> {
    cache: StudentContextCache<S>,
    clock: C,
    freshness: FreshnessWindow,
    reset_cooldown_ms: i64,
    state: ScanState,
}

impl<S: KeyValueStore, C: Clock> Scanner<S, C> {
    pub fn new(cache: StudentContextCache<S>, clock: C, config: &ScannerConfig) -> Self {
        Self {
            cache,
            clock,
            freshness: FreshnessWindow::new(config.freshness_ms),
            reset_cooldown_ms: config.reset_cooldown_ms,
            state: ScanState::Idle,
        }
    }

    pub const fn state(&self) -> &ScanState {
        &self.state
    }

    pub const fn is_locked(&self) -> bool {
        !matches!(self.state, ScanState::Idle)
    }

    pub const fn cache(&self) -> &StudentContextCache<S> {
        &self.cache
    }

    /// Screen-mount hook: refresh the student context. On failure the
    /// previous cache stays in place and is logged; authorization then
    /// fails closed if it is incomplete.
    pub async fn activate<P: ProfileSource>(&mut self, source: &P) {
        if let Err(e) = self.cache.refresh(source).await {
            warn!(error = %e, "Failed to refresh student context");
        }
    }

    /// Take a raw camera payload through the lock guard and the local
    /// checks. Never suspends.
    pub fn accept(&mut self, raw: &str) -> Admission {
        self.poll_auto_reset();
        if self.is_locked() {
            debug!("Scan ignored while locked");
            return Admission::Ignored;
        }
        self.state = ScanState::Locked;

        match self.validate(raw) {
            Ok(pending) => {
                debug!(
                    session_id = %pending.token.session_id,
                    kind = %pending.token.kind,
                    "Scan accepted, submitting"
                );
                Admission::Submit(pending)
            }
            Err(failure) => Admission::Resolved(self.finish(ScanOutcome::Rejected(failure))),
        }
    }

    fn validate(&self, raw: &str) -> Result<PendingMark, ScanFailure> {
        let token = Token::parse(raw).map_err(|e| ScanFailure::MalformedPayload {
            reason: e.to_string(),
        })?;

        let now = self.clock.now_ms();
        if !self.freshness.is_fresh(&token, now) {
            return Err(ScanFailure::ExpiredToken {
                age_ms: token.age_ms(now),
            });
        }

        let request = self.cache.read().authorize(&token)?;
        Ok(PendingMark { token, request })
    }

    /// Apply the backend's answer to a submission from [`Scanner::accept`].
    pub fn resolve(
        &mut self,
        pending: PendingMark,
        result: Result<(), MarkRejection>,
    ) -> ScanOutcome {
        if self.state != ScanState::Locked {
            warn!(state = ?self.state, "Resolving a submission while not locked");
        }
        let outcome = match result {
            Ok(()) => ScanOutcome::Marked {
                kind: pending.token.kind,
                session_id: pending.token.session_id,
            },
            Err(rejection) => ScanOutcome::Rejected(rejection.into()),
        };
        self.finish(outcome)
    }

    fn finish(&mut self, outcome: ScanOutcome) -> ScanOutcome {
        match &outcome {
            ScanOutcome::Marked { kind, session_id } => {
                info!(session_id = %session_id, kind = %kind, "Attendance marked");
            }
            ScanOutcome::Rejected(failure) => {
                info!(code = failure.code(), reason = %failure, "Scan rejected");
            }
        }
        self.state = ScanState::Resolved {
            outcome: outcome.clone(),
            at_ms: self.clock.now_ms(),
        };
        outcome
    }

    /// Full scan: local checks, then at most one backend call.
    /// Returns `None` when the scan was ignored by the lock.
    pub async fn scan<B: AttendanceBackend>(&mut self, raw: &str, backend: &B) -> Option<ScanOutcome> {
        match self.accept(raw) {
            Admission::Ignored => None,
            Admission::Resolved(outcome) => Some(outcome),
            Admission::Submit(pending) => {
                let result = backend.mark(pending.request()).await;
                Some(self.resolve(pending, result))
            }
        }
    }

    /// Unlock after the cooldown if the last outcome allows it.
    pub fn poll_auto_reset(&mut self) -> bool {
        let due = match &self.state {
            ScanState::Resolved { outcome, at_ms } => {
                outcome.auto_resets()
                    && self.clock.now_ms().saturating_sub(*at_ms) >= self.reset_cooldown_ms
            }
            _ => false,
        };
        if due {
            debug!("Scanner auto-reset");
            self.state = ScanState::Idle;
        }
        due
    }

    /// Manual "Scan Again".
    pub fn reset(&mut self) {
        if self.state == ScanState::Locked {
            warn!("Manual reset while a submission is outstanding");
        }
        self.state = ScanState::Idle;
    }
}
