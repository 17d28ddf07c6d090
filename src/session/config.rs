use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::recognition::RecognitionRequest;

/// Configuration for a transcription session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "transcription-<uuid>")
    pub session_id: String,

    /// Request handed to the recognizer on every start
    pub request: RecognitionRequest,

    /// Return the status to Idle when a session ends in error.
    /// When false, the status keeps its last value after an error, and the
    /// next record-button press issues `stop`.
    pub idle_on_error: bool,

    /// Capacity of the recognition event broadcast channel
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("transcription-{}", uuid::Uuid::new_v4()),
            request: RecognitionRequest::default(),
            idle_on_error: true,
            event_capacity: 64,
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(cfg: &Config) -> Self {
        Self {
            request: RecognitionRequest {
                locale: cfg.recognition.locale.clone(),
                report_partial_results: cfg.recognition.report_partial_results,
                requires_on_device: cfg.recognition.requires_on_device,
                task_hint: cfg.recognition.task_hint,
                contextual_strings: cfg.recognition.contextual_strings.clone(),
            },
            idle_on_error: cfg.session.idle_on_error,
            event_capacity: cfg.session.event_capacity,
            ..Self::default()
        }
    }
}
