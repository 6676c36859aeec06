//! Teacher-side token emitter.
//!
//! Produces a fresh [`Token`] for a fixed session on every tick. The
//! serialized payload is what the renderer turns into a QR image.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::token::{LabClass, Token};

/// Timestamps kept acceptable: the current token and the previous two.
const OVERLAP_TOKENS: usize = 3;

/// What kind of token the session rotates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitterTarget {
    Attendance,
    Lab(LabClass),
}

/// Rotating token generator for one session.
#[derive(Debug)]
pub struct Emitter<C> {
    session_id: String,
    target: EmitterTarget,
    clock: C,
    recent: VecDeque<i64>,
}

impl<C: Clock> Emitter<C> {
    /// `session_id` comes from the backend session-create call.
    pub fn new(session_id: impl Into<String>, target: EmitterTarget, clock: C) -> Self {
        Self {
            session_id: session_id.into(),
            target,
            clock,
            recent: VecDeque::with_capacity(OVERLAP_TOKENS),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Build the next token. `issuedAt` is strictly increasing even if the
    /// clock stalls or steps backwards.
    pub fn next_token(&mut self) -> Token {
        let now = self.clock.now_ms();
        let issued_at = match self.recent.back() {
            Some(&last) if now <= last => last + 1,
            _ => now,
        };

        if self.recent.len() == OVERLAP_TOKENS {
            self.recent.pop_front();
        }
        self.recent.push_back(issued_at);

        match &self.target {
            EmitterTarget::Attendance => Token::attendance(self.session_id.clone(), issued_at),
            EmitterTarget::Lab(class) => Token::lab(self.session_id.clone(), class.clone(), issued_at),
        }
    }

    /// One rotation: build the next token and serialize it for display.
    pub fn tick(&mut self) -> serde_json::Result<String> {
        let token = self.next_token();
        let payload = token.to_payload()?;
        debug!(
            session_id = %self.session_id,
            kind = %token.kind,
            issued_at = token.issued_at,
            "Emitted attendance token"
        );
        Ok(payload)
    }

    /// Issue timestamps of the current and previous two tokens, oldest first.
    pub fn recent_issued(&self) -> impl Iterator<Item = i64> + '_ {
        self.recent.iter().copied()
    }

    /// Whether `issued_at` belongs to one of the overlapping tokens.
    pub fn is_recent(&self, issued_at: i64) -> bool {
        self.recent.contains(&issued_at)
    }
}

/// Spawn the rotation loop.
///
/// The first token is published immediately, then one per `interval`.
/// Each payload replaces the previous one on `publish`. The loop ends when
/// `shutdown` flips or every receiver of `publish` is gone; await the
/// returned handle on teardown so no timer outlives its screen.
pub fn spawn_emitter<C>(
    mut emitter: Emitter<C>,
    interval: Duration,
    publish: watch::Sender<Option<String>>,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()>
where
    C: Clock + Send + 'static,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            session_id = %emitter.session_id(),
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "Emitter started"
        );

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    match emitter.tick() {
                        Ok(payload) => {
                            publish.send_replace(Some(payload));
                        }
                        Err(e) => warn!(error = %e, "Failed to serialize token"),
                    }
                    if publish.is_closed() {
                        info!("Emitter has no readers, stopping");
                        return;
                    }
                }
                _ = shutdown.changed() => {
                    info!(session_id = %emitter.session_id(), "Emitter shutting down");
                    return;
                }
            }
        }
    })
}
