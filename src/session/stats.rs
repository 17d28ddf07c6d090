use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::SessionStatus;
use crate::recognition::Normalized;

/// Statistics about a transcription session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// Current indicator status
    pub status: SessionStatus,

    /// When the most recent recognition attempt started
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds since `started_at`
    pub duration_secs: f64,

    /// Recognition attempts begun with `start`
    pub sessions_started: usize,

    /// Recognizer callbacks applied to the session
    pub callbacks_received: usize,

    /// Non-final results received
    pub partial_results: usize,

    /// Final results received
    pub final_results: usize,

    /// Errors reported, including failed permission checks
    pub errors: usize,

    /// Alternatives currently shown in the history
    pub history_len: usize,
}

/// Running counters kept by the session
#[derive(Debug, Clone, Default)]
pub(crate) struct StatsCounters {
    pub sessions_started: usize,
    pub callbacks_received: usize,
    pub partial_results: usize,
    pub final_results: usize,
    pub errors: usize,
}

impl StatsCounters {
    pub fn record(&mut self, normalized: &Normalized) {
        let Some(event) = &normalized.event else {
            return;
        };

        if event.is_error() {
            self.errors += 1;
        } else if event.is_final {
            self.final_results += 1;
        } else {
            self.partial_results += 1;
        }
    }
}
