//! Recording indicator state and its command table.
//!
//! - Idle --start--> Recording
//! - Recording --stop--> Idle
//! - Recognizing --stop--> Idle
//!
//! Everything else is ignored. Recording and Recognizing behave the same for
//! `stop`; Recognizing only marks that results are flowing.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No recognition in progress
    #[default]
    Idle,
    /// Capturing audio (or waiting on permission checks to do so)
    Recording,
    /// Capturing audio and receiving results
    Recognizing,
}

/// Explicit caller actions on a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
}

/// Colour of the record button for each status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndicatorColor {
    Green,
    Red,
    Blue,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "Idle"),
            SessionStatus::Recording => write!(f, "Recording"),
            SessionStatus::Recognizing => write!(f, "Recognizing"),
        }
    }
}

impl SessionStatus {
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionStatus::Idle)
    }

    /// Next status after `command`, or `None` if the command does not apply
    pub fn on_command(&self, command: Command) -> Option<SessionStatus> {
        match (self, command) {
            (SessionStatus::Idle, Command::Start) => Some(SessionStatus::Recording),
            (SessionStatus::Recording, Command::Stop)
            | (SessionStatus::Recognizing, Command::Stop) => Some(SessionStatus::Idle),
            _ => None,
        }
    }

    /// The command a record-button press issues in this status
    pub fn toggle_command(&self) -> Command {
        match self {
            SessionStatus::Idle => Command::Start,
            SessionStatus::Recording | SessionStatus::Recognizing => Command::Stop,
        }
    }

    pub fn indicator(&self) -> IndicatorColor {
        match self {
            SessionStatus::Idle => IndicatorColor::Green,
            SessionStatus::Recording => IndicatorColor::Red,
            SessionStatus::Recognizing => IndicatorColor::Blue,
        }
    }
}
