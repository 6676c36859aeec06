//! Teacher subcommand: emit rotating tokens.
//!
//! Prints one JSON payload per rotation to stdout. Pipe it into a QR
//! renderer to project the code.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use campusqr_core::{Clock, Emitter, EmitterTarget, FieldValue, LabClass, spawn_emitter};

/// Arguments of `campusqr emit`.
#[derive(clap::Args, Debug, Clone)]
pub struct EmitArgs {
    /// Session ID returned by the backend.
    #[arg(long)]
    pub session: String,

    /// Emit lab tokens restricted to one batch.
    #[arg(long, requires_all = ["year", "division", "batch"])]
    pub lab: bool,

    /// Class year (lab tokens).
    #[arg(long)]
    pub year: Option<String>,

    /// Division (lab tokens).
    #[arg(long)]
    pub division: Option<String>,

    /// Batch label, e.g. "C1" (lab tokens).
    #[arg(long)]
    pub batch: Option<String>,

    /// Rotation interval; defaults to `emitter.interval_ms`.
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Stop after this many tokens.
    #[arg(long)]
    pub count: Option<u64>,
}

impl EmitArgs {
    pub fn target(&self) -> anyhow::Result<EmitterTarget> {
        if !self.lab {
            return Ok(EmitterTarget::Attendance);
        }
        let field = |name: &str, value: Option<&str>| {
            value
                .map(class_field)
                .ok_or_else(|| anyhow::anyhow!("--{name} is required with --lab"))
        };
        Ok(EmitterTarget::Lab(LabClass {
            year: field("year", self.year.as_deref())?,
            division: field("division", self.division.as_deref())?,
            batch: field("batch", self.batch.as_deref())?,
        }))
    }
}

/// Numeric class fields travel as JSON numbers, everything else as text.
pub fn class_field(raw: &str) -> FieldValue {
    let raw = raw.trim();
    raw.parse::<i64>()
        .map_or_else(|_| FieldValue::Text(raw.to_string()), FieldValue::Number)
}

/// Run the emitter and write each payload as a line until `count` tokens
/// were written or `stop` completes. Returns the number written.
pub async fn stream_tokens<C>(
    emitter: Emitter<C>,
    interval: Duration,
    count: Option<u64>,
    out: &mut impl Write,
    stop: impl Future<Output = ()>,
) -> anyhow::Result<u64>
where
    C: Clock + Send + 'static,
{
    let session_id = emitter.session_id().to_string();
    let (publish, mut latest) = watch::channel(None);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = spawn_emitter(emitter, interval, publish, shutdown_rx);
    tokio::pin!(stop);

    let mut written = 0;
    while count.is_none_or(|n| written < n) {
        tokio::select! {
            changed = latest.changed() => {
                if changed.is_err() {
                    break;
                }
                let payload = latest.borrow_and_update().clone();
                if let Some(payload) = payload {
                    writeln!(out, "{payload}")?;
                    out.flush()?;
                    written += 1;
                }
            }
            () = &mut stop => break,
        }
    }

    let _ = shutdown_tx.send(true);
    handle.await?;
    info!(session_id = %session_id, tokens = written, "Emitter stopped");
    Ok(written)
}

/// Completes on Ctrl+C.
pub async fn ctrl_c() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use campusqr_core::{ManualClock, Token, TokenKind};

    const T: i64 = 1_700_000_000_000;

    fn args(lab: bool) -> EmitArgs {
        EmitArgs {
            session: "L1".into(),
            lab,
            year: Some("2".into()),
            division: Some("B".into()),
            batch: Some("C1".into()),
            interval_ms: None,
            count: None,
        }
    }

    #[test]
    fn class_field_keeps_numbers_numeric() {
        assert_eq!(class_field("2"), FieldValue::Number(2));
        assert_eq!(class_field(" C1 "), FieldValue::Text("C1".into()));
    }

    #[test]
    fn lab_target_from_flags() {
        let EmitterTarget::Lab(class) = args(true).target().unwrap() else {
            unreachable!("lab flag builds a lab target");
        };
        assert_eq!(class.year, FieldValue::Number(2));
        assert_eq!(class.batch, FieldValue::Text("C1".into()));
        assert_eq!(args(false).target().unwrap(), EmitterTarget::Attendance);
    }

    #[test]
    fn lab_target_needs_batch() {
        let mut a = args(true);
        a.batch = None;
        assert!(a.target().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn stream_stops_after_count() {
        let clock = ManualClock::new(T);
        let emitter = Emitter::new("S1", EmitterTarget::Attendance, clock);
        let mut out = Vec::new();

        let written = stream_tokens(
            emitter,
            Duration::from_millis(3_000),
            Some(3),
            &mut out,
            std::future::pending(),
        )
        .await
        .unwrap();

        assert_eq!(written, 3);
        let tokens: Vec<Token> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| Token::parse(l).unwrap())
            .collect();
        assert_eq!(tokens.len(), 3);
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Attendance));
        assert!(tokens.windows(2).all(|w| w[0].issued_at < w[1].issued_at));
    }

    #[tokio::test(start_paused = true)]
    async fn stream_stops_on_signal() {
        let emitter = Emitter::new("S1", EmitterTarget::Attendance, ManualClock::new(T));
        let mut out = Vec::new();

        let written = stream_tokens(
            emitter,
            Duration::from_millis(3_000),
            None,
            &mut out,
            tokio::time::sleep(Duration::from_millis(7_000)),
        )
        .await
        .unwrap();

        assert_eq!(written, 3);
    }
}
