//! Tests for the scanner state machine.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::api::{ApiError, AttendanceBackend, MarkRejection, MarkRequest, ProfileSource, StudentProfile};
use crate::clock::ManualClock;
use crate::config::ScannerConfig;
use crate::scanner::{Admission, ScanFailure, ScanOutcome, ScanState, Scanner};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::student::{KEY_BATCH, KEY_DIVISION, KEY_STUDENT_ID, KEY_YEAR, StudentContextCache};
use crate::token::{FieldValue, LabClass, Token};

const T: i64 = 1_700_000_000_000;

/// Backend double that replays canned answers and records requests.
#[derive(Default)]
struct FakeBackend {
    calls: AtomicUsize,
    answers: Mutex<VecDeque<Result<(), MarkRejection>>>,
    seen: Mutex<Vec<MarkRequest>>,
}

impl FakeBackend {
    fn answering(answers: impl IntoIterator<Item = Result<(), MarkRejection>>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AttendanceBackend for FakeBackend {
    async fn mark(&self, request: &MarkRequest) -> Result<(), MarkRejection> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        self.answers.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

struct FixedProfile(StudentProfile);

impl ProfileSource for FixedProfile {
    async fn fetch_profile(&self, _student_id: &str) -> Result<StudentProfile, ApiError> {
        Ok(self.0.clone())
    }
}

fn config() -> ScannerConfig {
    ScannerConfig {
        freshness_ms: 10_000,
        reset_cooldown_ms: 2_000,
    }
}

fn scanner_with_batch(clock: &ManualClock, batch: &str) -> Scanner<MemoryStore, ManualClock> {
    let mut store = MemoryStore::new();
    store
        .set_many(&[
            (KEY_STUDENT_ID, "STU1"),
            (KEY_YEAR, "2"),
            (KEY_DIVISION, "B"),
            (KEY_BATCH, batch),
        ])
        .unwrap();
    Scanner::new(StudentContextCache::new(store), clock.clone(), &config())
}

fn theory_payload(issued_at: i64) -> String {
    Token::attendance("S1", issued_at).to_payload().unwrap()
}

fn lab_payload(batch: &str, issued_at: i64) -> String {
    Token::lab(
        "L1",
        LabClass {
            year: FieldValue::Number(2),
            division: "B".into(),
            batch: batch.into(),
        },
        issued_at,
    )
    .to_payload()
    .unwrap()
}

fn failure_code(outcome: Option<ScanOutcome>) -> &'static str {
    outcome.unwrap().code()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn fresh_theory_token_is_submitted_and_marked() {
    let clock = ManualClock::new(T + 5_000);
    let mut scanner = scanner_with_batch(&clock, "B1");
    let backend = FakeBackend::default();

    let outcome = scanner.scan(&theory_payload(T), &backend).await.unwrap();

    assert!(outcome.is_success());
    assert_eq!(outcome.code(), "success");
    assert_eq!(backend.calls(), 1);
    let seen = backend.seen.lock().unwrap();
    assert_eq!(seen[0].session_id, "S1");
    assert_eq!(seen[0].student_id, "STU1");
    assert!(seen[0].student_batch.is_none());
}

#[tokio::test]
async fn stale_token_expires_without_network_call() {
    let clock = ManualClock::new(T + 15_000);
    let mut scanner = scanner_with_batch(&clock, "B1");
    let backend = FakeBackend::default();

    let outcome = scanner.scan(&theory_payload(T), &backend).await;

    assert_eq!(failure_code(outcome), "expired");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn lab_token_for_other_batch_is_forbidden_without_network_call() {
    let clock = ManualClock::new(T + 1_000);
    let mut scanner = scanner_with_batch(&clock, "B1");
    let backend = FakeBackend::default();

    let outcome = scanner.scan(&lab_payload("C1", T), &backend).await.unwrap();

    assert_eq!(outcome.code(), "forbidden");
    assert_eq!(outcome.message(), "This lab is only for Batch C1");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn duplicate_keeps_lock_and_blocks_resubmission() {
    let clock = ManualClock::new(T + 1_000);
    let mut scanner = scanner_with_batch(&clock, "B1");
    let backend = FakeBackend::answering([Err(MarkRejection::Conflict)]);
    let payload = theory_payload(T);

    let first = scanner.scan(&payload, &backend).await;
    assert_eq!(failure_code(first), "already-marked");

    clock.advance(5_000);
    assert!(!scanner.poll_auto_reset());
    assert!(scanner.scan(&payload, &backend).await.is_none());
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn matching_lab_token_sends_batch() {
    let clock = ManualClock::new(T + 1_000);
    let mut scanner = scanner_with_batch(&clock, "B1");
    let backend = FakeBackend::default();

    let outcome = scanner.scan(&lab_payload("B1", T), &backend).await.unwrap();

    assert_eq!(outcome.title(), "Lab Attendance Marked");
    let seen = backend.seen.lock().unwrap();
    assert_eq!(seen[0].student_batch.as_deref(), Some("B1"));
    assert_eq!(seen[0].path(), "/api/lab-attendance/mark");
}

// =============================================================================
// Malformed payloads
// =============================================================================

#[tokio::test]
async fn malformed_payloads_are_invalid_without_network_call() {
    let clock = ManualClock::new(T);
    let backend = FakeBackend::default();
    let payloads = [
        "not json at all",
        "{}",
        r#"{"type":"ATTENDANCE_QR","issuedAt":1}"#,
        r#"{"type":"ATTENDANCE_QR","sessionId":"S1"}"#,
        r#"{"sessionId":"S1","issuedAt":1}"#,
        r#"{"type":"LIBRARY_QR","sessionId":"S1","issuedAt":1}"#,
    ];

    for payload in payloads {
        let mut scanner = scanner_with_batch(&clock, "B1");
        let outcome = scanner.scan(payload, &backend).await;
        assert_eq!(failure_code(outcome), "invalid", "payload: {payload}");
    }
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn invalid_does_not_auto_reset_but_manual_reset_works() {
    let clock = ManualClock::new(T);
    let mut scanner = scanner_with_batch(&clock, "B1");
    let backend = FakeBackend::default();

    scanner.scan("garbage", &backend).await;
    clock.advance(60_000);
    assert!(!scanner.poll_auto_reset());
    assert!(scanner.is_locked());

    scanner.reset();
    assert_eq!(scanner.state(), &ScanState::Idle);
    let outcome = scanner.scan(&theory_payload(T + 59_000), &backend).await.unwrap();
    assert!(outcome.is_success());
}

// =============================================================================
// Lock and reset behaviour
// =============================================================================

#[tokio::test]
async fn repeated_frames_during_submission_are_ignored() {
    let clock = ManualClock::new(T + 500);
    let mut scanner = scanner_with_batch(&clock, "B1");
    let backend = FakeBackend::default();
    let payload = theory_payload(T);

    let Admission::Submit(pending) = scanner.accept(&payload) else {
        panic!("expected submission");
    };
    assert_eq!(scanner.accept(&payload), Admission::Ignored);
    assert_eq!(scanner.accept(&payload), Admission::Ignored);

    let result = backend.mark(pending.request()).await;
    let outcome = scanner.resolve(pending, result);

    assert!(outcome.is_success());
    assert_eq!(backend.calls(), 1);
    assert_eq!(scanner.accept(&payload), Admission::Ignored);
}

#[tokio::test]
async fn transient_failure_auto_resets_after_cooldown() {
    let clock = ManualClock::new(T + 1_000);
    let mut scanner = scanner_with_batch(&clock, "B1");
    let backend = FakeBackend::answering([
        Err(MarkRejection::Failed {
            message: "HTTP 503".into(),
        }),
        Ok(()),
    ]);
    let payload = theory_payload(T);

    assert_eq!(failure_code(scanner.scan(&payload, &backend).await), "failed");

    clock.advance(1_000);
    assert!(scanner.scan(&payload, &backend).await.is_none());

    clock.advance(1_000);
    let retry = scanner.scan(&payload, &backend).await.unwrap();
    assert!(retry.is_success());
    assert_eq!(backend.calls(), 2);
}

#[tokio::test]
async fn expired_auto_resets_after_cooldown() {
    let clock = ManualClock::new(T + 20_000);
    let mut scanner = scanner_with_batch(&clock, "B1");
    let backend = FakeBackend::default();

    scanner.scan(&theory_payload(T), &backend).await;
    assert!(!scanner.poll_auto_reset());
    clock.advance(2_000);
    assert!(scanner.poll_auto_reset());
    assert!(!scanner.is_locked());
}

#[tokio::test]
async fn backend_forbidden_carries_message_and_stays_locked() {
    let clock = ManualClock::new(T + 1_000);
    let mut scanner = scanner_with_batch(&clock, "B1");
    let backend = FakeBackend::answering([Err(MarkRejection::Forbidden {
        message: "Session closed".into(),
    })]);

    let outcome = scanner.scan(&theory_payload(T), &backend).await.unwrap();
    assert_eq!(
        outcome,
        ScanOutcome::Rejected(ScanFailure::AuthorizationMismatch {
            message: "Session closed".into()
        })
    );
    clock.advance(10_000);
    assert!(!scanner.poll_auto_reset());
}

// =============================================================================
// Student context
// =============================================================================

#[tokio::test]
async fn empty_cache_fails_closed() {
    let clock = ManualClock::new(T + 1_000);
    let mut scanner = Scanner::new(
        StudentContextCache::new(MemoryStore::new()),
        clock.clone(),
        &config(),
    );
    let backend = FakeBackend::default();

    let outcome = scanner.scan(&theory_payload(T), &backend).await;
    assert_eq!(failure_code(outcome), "forbidden");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn activate_refreshes_batch_before_scanning() {
    let clock = ManualClock::new(T + 1_000);
    let mut scanner = scanner_with_batch(&clock, "B1");
    let backend = FakeBackend::default();
    let profile = FixedProfile(StudentProfile {
        year: FieldValue::Number(2),
        division: "B".into(),
        sub_branch: Some("C1".into()),
    });

    scanner.activate(&profile).await;
    assert_eq!(scanner.cache().read().batch.as_deref(), Some("C1"));

    let outcome = scanner.scan(&lab_payload("C1", T), &backend).await.unwrap();
    assert!(outcome.is_success());
}
