//! Collaborator contracts: the platform recognizer and permission checks.

use tokio::sync::mpsc;

use super::error::RecognizerError;
use super::types::{RawResult, RecognitionRequest};
use crate::audio::AudioFrame;

/// One recognizer callback: a result, an error, both, or (rarely) neither
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCallback {
    pub result: Option<RawResult>,
    pub error: Option<RecognizerError>,
}

impl RawCallback {
    pub fn result(result: RawResult) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn error(error: RecognizerError) -> Self {
        Self {
            result: None,
            error: Some(error),
        }
    }
}

/// Handle to an in-flight recognition task
pub trait RecognitionTask: Send + Sync {
    /// Cancel the task. Cancelling twice is a no-op.
    fn cancel(&mut self);
}

/// Speech recognizer provider
///
/// A task consumes audio frames from `audio` and reports results through
/// `results`, serially, ending with a final result or an error.
#[async_trait::async_trait]
pub trait Recognizer: Send + Sync {
    /// Whether a recognizer instance can be created for `locale`
    fn supports_locale(&self, locale: &str) -> bool;

    /// Whether the recognizer can take a task right now
    fn is_available(&self) -> bool;

    async fn recognize(
        &self,
        request: RecognitionRequest,
        audio: mpsc::Receiver<AudioFrame>,
        results: mpsc::Sender<RawCallback>,
    ) -> Result<Box<dyn RecognitionTask>, RecognizerError>;

    /// Get recognizer name for logging
    fn name(&self) -> &str;
}

/// Microphone and speech-recognition authorization
#[async_trait::async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn check_recognition_authorization(&self) -> bool;

    async fn check_microphone(&self) -> bool;
}
