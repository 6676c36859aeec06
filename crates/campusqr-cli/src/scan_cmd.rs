//! Student subcommand: scan.
//!
//! Each input line is one camera callback carrying a raw QR payload. A
//! line reading `reset` is the manual "Scan Again". Lines that arrive
//! while a submission is outstanding, `reset` included, are dropped. One JSON outcome line is written per resolved scan.

use std::future::Future;
use std::io::Write;
use std::pin::Pin;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use campusqr_core::api::{AttendanceBackend, MarkRejection};
use campusqr_core::scanner::PendingMark;
use campusqr_core::{Admission, Clock, KeyValueStore, Scanner};

use crate::output::write_outcome;

const RESET_COMMAND: &str = "reset";

type Submission<'a> = Pin<Box<dyn Future<Output = (PendingMark, Result<(), MarkRejection>)> + 'a>>;

/// Wait for the outstanding submission, or forever if there is none.
async fn next_answer(
    inflight: &mut Option<Submission<'_>>,
) -> (PendingMark, Result<(), MarkRejection>) {
    match inflight.as_mut() {
        Some(submission) => submission.await,
        None => std::future::pending().await,
    }
}

/// Drive `scanner` from `input` until end of input. Returns the number
/// of resolved scans.
pub async fn run_scan_loop<S, C, B, R>(
    scanner: &mut Scanner<S, C>,
    backend: &B,
    input: R,
    out: &mut impl Write,
) -> anyhow::Result<u64>
where
    S: KeyValueStore,
    C: Clock,
    B: AttendanceBackend,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut inflight: Option<Submission<'_>> = None;
    let mut resolved = 0;
    let mut input_open = true;

    while input_open || inflight.is_some() {
        tokio::select! {
            biased;

            (pending, result) = next_answer(&mut inflight), if inflight.is_some() => {
                inflight = None;
                let outcome = scanner.resolve(pending, result);
                write_outcome(out, &outcome)?;
                out.flush()?;
                resolved += 1;
            }
            line = lines.next_line(), if input_open => {
                let Some(line) = line? else {
                    input_open = false;
                    continue;
                };
                let raw = line.trim();
                if raw.is_empty() {
                    continue;
                }
                if raw == RESET_COMMAND {
                    if inflight.is_some() {
                        debug!("Reset ignored while a submission is outstanding");
                        continue;
                    }
                    scanner.reset();
                    info!("Scanner reset");
                    continue;
                }
                match scanner.accept(raw) {
                    Admission::Ignored => debug!("Frame dropped by scan lock"),
                    Admission::Resolved(outcome) => {
                        write_outcome(out, &outcome)?;
                        out.flush()?;
                        resolved += 1;
                    }
                    Admission::Submit(pending) => {
                        inflight = Some(Box::pin(async move {
                            let result = backend.mark(pending.request()).await;
                            (pending, result)
                        }));
                    }
                }
            }
        }
    }
    Ok(resolved)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use campusqr_core::api::MarkRequest;
    use campusqr_core::config::ScannerConfig;
    use campusqr_core::student::{KEY_BATCH, KEY_DIVISION, KEY_STUDENT_ID, KEY_YEAR};
    use campusqr_core::{ManualClock, MemoryStore, StudentContextCache, Token};

    const T: i64 = 1_700_000_000_000;

    /// Answers every mark with the same result after a short delay.
    struct SlowBackend {
        calls: AtomicUsize,
        answer: Result<(), MarkRejection>,
    }

    impl SlowBackend {
        fn new(answer: Result<(), MarkRejection>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                answer,
            }
        }
    }

    impl AttendanceBackend for SlowBackend {
        async fn mark(&self, _request: &MarkRequest) -> Result<(), MarkRejection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.answer.clone()
        }
    }

    fn scanner(clock: &ManualClock) -> Scanner<MemoryStore, ManualClock> {
        let mut store = MemoryStore::new();
        store
            .set_many(&[
                (KEY_STUDENT_ID, "STU1"),
                (KEY_YEAR, "2"),
                (KEY_DIVISION, "B"),
                (KEY_BATCH, "B1"),
            ])
            .unwrap();
        Scanner::new(
            StudentContextCache::new(store),
            clock.clone(),
            &ScannerConfig::default(),
        )
    }

    fn codes(out: Vec<u8>) -> Vec<String> {
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| {
                let v: serde_json::Value = serde_json::from_str(l).unwrap();
                v["code"].as_str().unwrap().to_string()
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_frames_submits_once() {
        let clock = ManualClock::new(T + 1_000);
        let mut scanner = scanner(&clock);
        let backend = SlowBackend::new(Ok(()));
        let payload = Token::attendance("S1", T).to_payload().unwrap();
        let input = format!("{payload}\n{payload}\n{payload}\n");
        let mut out = Vec::new();

        let resolved = run_scan_loop(&mut scanner, &backend, input.as_bytes(), &mut out)
            .await
            .unwrap();

        assert_eq!(resolved, 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(codes(out), vec!["success"]);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_line_unlocks_after_invalid() {
        let clock = ManualClock::new(T + 1_000);
        let mut scanner = scanner(&clock);
        let backend = SlowBackend::new(Err(MarkRejection::Conflict));
        let payload = Token::attendance("S1", T).to_payload().unwrap();
        let input = format!("not a token\n{payload}\nreset\n\n{payload}\n");
        let mut out = Vec::new();

        run_scan_loop(&mut scanner, &backend, input.as_bytes(), &mut out)
            .await
            .unwrap();

        assert_eq!(codes(out), vec!["invalid", "already-marked"]);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_during_submission_keeps_first_request() {
        let clock = ManualClock::new(T + 1_000);
        let mut scanner = scanner(&clock);
        let backend = SlowBackend::new(Ok(()));
        let first = Token::attendance("S1", T).to_payload().unwrap();
        let second = Token::attendance("S2", T).to_payload().unwrap();
        let input = format!("{first}\nreset\n{second}\n");
        let mut out = Vec::new();

        let resolved = run_scan_loop(&mut scanner, &backend, input.as_bytes(), &mut out)
            .await
            .unwrap();

        assert_eq!(resolved, 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        let line: serde_json::Value =
            serde_json::from_str(String::from_utf8(out).unwrap().trim()).unwrap();
        assert_eq!(line["code"], "success");
        assert_eq!(line["sessionId"], "S1");
    }
}
