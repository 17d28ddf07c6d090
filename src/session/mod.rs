//! Transcription session management
//!
//! This module provides the `TranscriptionSession` abstraction that manages:
//! - The permission and availability checks before capture begins
//! - Audio capture and the recognition task, with idempotent teardown
//! - Projection of recognizer output onto live text, status and history
//! - Session statistics

mod config;
mod observable;
mod projector;
mod session;
mod stats;
mod status;

pub use config::SessionConfig;
pub use observable::Observable;
pub use projector::SessionProjector;
pub use session::{StartOutcome, TranscriptionSession};
pub use stats::SessionStats;
pub use status::{Command, IndicatorColor, SessionStatus};
