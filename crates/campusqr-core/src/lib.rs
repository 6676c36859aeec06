//! `CampusQR` Core Library
//!
//! Rotating-QR attendance check-in:
//! - Token schema and freshness window
//! - Teacher-side emitter producing a new token every few seconds
//! - Student-side scanner state machine with a submit-once lock
//! - Student-context cache over a local key-value store
//! - REST client for the attendance backend
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod api;
pub mod clock;
pub mod config;
pub mod emitter;
pub mod error;
pub mod scanner;
pub mod session;
pub mod storage;
pub mod student;
pub mod token;
pub mod tracing_init;

#[cfg(test)]
mod scanner_tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use emitter::{Emitter, EmitterTarget, spawn_emitter};
pub use error::{Error, Result};
pub use scanner::{Admission, ScanFailure, ScanOutcome, ScanState, Scanner};
pub use session::EditWindow;
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use student::{StudentContext, StudentContextCache};
pub use token::{FieldValue, FreshnessWindow, LabClass, Token, TokenKind};
