//! Session edit window for manual attendance changes.

use tracing::warn;

use crate::error::{Error, Result};

/// How long after creation a session still accepts manual edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditWindow {
    length_ms: i64,
}

impl Default for EditWindow {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MS)
    }
}

impl EditWindow {
    /// One hour.
    pub const DEFAULT_MS: i64 = 60 * 60 * 1000;

    pub const fn new(length_ms: i64) -> Self {
        Self { length_ms }
    }

    pub const fn length_ms(&self) -> i64 {
        self.length_ms
    }

    /// Inclusive at the boundary. A creation time in the future counts as open.
    pub const fn is_open(&self, created_at_ms: i64, now_ms: i64) -> bool {
        now_ms.saturating_sub(created_at_ms) <= self.length_ms
    }

    /// Reject an edit locally once the window has closed.
    pub fn check(&self, session_id: &str, created_at_ms: i64, now_ms: i64) -> Result<()> {
        if self.is_open(created_at_ms, now_ms) {
            return Ok(());
        }
        warn!(
            session_id,
            age_ms = now_ms.saturating_sub(created_at_ms),
            "Edit window closed"
        );
        Err(Error::EditWindowClosed {
            session_id: session_id.to_string(),
        })
    }
}
