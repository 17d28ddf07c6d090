// Scripted recognizer and fixed permissions
//
// Replays a prepared sequence of recognizer callbacks against whatever audio
// the session captures. Used by the replay binary and the integration tests.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::error::RecognizerError;
use super::provider::{PermissionProvider, RawCallback, RecognitionTask, Recognizer};
use super::types::{RawResult, RawTranscription, RecognitionRequest};
use crate::audio::AudioFrame;

/// One scripted callback, delivered `delay_ms` after the previous one
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptStep {
    #[serde(default)]
    pub delay_ms: u64,
    pub callback: ScriptedCallback,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptedCallback {
    Result {
        transcriptions: Vec<RawTranscription>,
        #[serde(default)]
        is_final: bool,
    },
    Error {
        message: String,
    },
    /// A callback with neither result nor error
    Empty,
}

impl ScriptStep {
    pub fn partial(transcriptions: Vec<RawTranscription>) -> Self {
        Self::immediate(ScriptedCallback::Result {
            transcriptions,
            is_final: false,
        })
    }

    pub fn final_result(transcriptions: Vec<RawTranscription>) -> Self {
        Self::immediate(ScriptedCallback::Result {
            transcriptions,
            is_final: true,
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::immediate(ScriptedCallback::Error {
            message: message.into(),
        })
    }

    pub fn immediate(callback: ScriptedCallback) -> Self {
        Self {
            delay_ms: 0,
            callback,
        }
    }

    pub fn after(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    fn to_callback(&self) -> RawCallback {
        match &self.callback {
            ScriptedCallback::Result {
                transcriptions,
                is_final,
            } => RawCallback::result(RawResult::new(transcriptions.clone(), *is_final)),
            ScriptedCallback::Error { message } => {
                RawCallback::error(RecognizerError::Underlying(message.clone()))
            }
            ScriptedCallback::Empty => RawCallback::default(),
        }
    }
}

/// Load a JSON array of script steps
pub fn load_script(path: impl AsRef<Path>) -> Result<Vec<ScriptStep>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse script {}", path.display()))
}

/// What a `ScriptedRecognizer` has been asked to do so far
#[derive(Debug, Clone, Default)]
pub struct RecognizerProbe {
    tasks: Arc<AtomicUsize>,
    cancels: Arc<AtomicUsize>,
    frames: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<RecognitionRequest>>>,
}

impl RecognizerProbe {
    pub fn tasks_started(&self) -> usize {
        self.tasks.load(Ordering::SeqCst)
    }

    /// Cancels that stopped a running task
    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    pub fn frames_received(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<RecognitionRequest> {
        self.last_request
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

pub struct ScriptedRecognizer {
    steps: Vec<ScriptStep>,
    locales: Vec<String>,
    available: Arc<AtomicBool>,
    probe: RecognizerProbe,
}

impl ScriptedRecognizer {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            locales: Vec::new(),
            available: Arc::new(AtomicBool::new(true)),
            probe: RecognizerProbe::default(),
        }
    }

    /// Restrict the recognizer to the given locales (default: any locale)
    pub fn with_locales(mut self, locales: &[&str]) -> Self {
        self.locales = locales.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn probe(&self) -> RecognizerProbe {
        self.probe.clone()
    }
}

#[async_trait::async_trait]
impl Recognizer for ScriptedRecognizer {
    fn supports_locale(&self, locale: &str) -> bool {
        self.locales.is_empty() || self.locales.iter().any(|l| l == locale)
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn recognize(
        &self,
        request: RecognitionRequest,
        mut audio: mpsc::Receiver<AudioFrame>,
        results: mpsc::Sender<RawCallback>,
    ) -> Result<Box<dyn RecognitionTask>, RecognizerError> {
        info!(
            "Scripted recognition task started ({} steps, locale {}, {} contextual strings)",
            self.steps.len(),
            request.locale,
            request.contextual_strings.len()
        );

        if let Ok(mut last) = self.probe.last_request.lock() {
            *last = Some(request);
        }
        self.probe.tasks.fetch_add(1, Ordering::SeqCst);

        let frames = Arc::clone(&self.probe.frames);
        let drain = tokio::spawn(async move {
            while audio.recv().await.is_some() {
                frames.fetch_add(1, Ordering::SeqCst);
            }
        });

        let steps = self.steps.clone();
        let replay = tokio::spawn(async move {
            for step in steps {
                if step.delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(step.delay_ms)).await;
                }
                if results.send(step.to_callback()).await.is_err() {
                    debug!("Result channel closed, ending script early");
                    break;
                }
            }
        });

        Ok(Box::new(ScriptedTask {
            drain,
            replay,
            cancelled: false,
            cancels: Arc::clone(&self.probe.cancels),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedTask {
    drain: JoinHandle<()>,
    replay: JoinHandle<()>,
    cancelled: bool,
    cancels: Arc<AtomicUsize>,
}

impl RecognitionTask for ScriptedTask {
    fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.replay.abort();
        self.drain.abort();
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for ScriptedTask {
    fn drop(&mut self) {
        self.replay.abort();
        self.drain.abort();
    }
}

/// Permission answers fixed at construction, optionally slow to arrive
#[derive(Debug, Clone)]
pub struct StaticPermissions {
    recognition: bool,
    microphone: bool,
    delay: Duration,
    checks: Arc<AtomicUsize>,
}

impl StaticPermissions {
    pub fn granted() -> Self {
        Self::new(true, true)
    }

    pub fn new(recognition: bool, microphone: bool) -> Self {
        Self {
            recognition,
            microphone,
            delay: Duration::ZERO,
            checks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer each check only after `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    async fn answer(&self, granted: bool) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        granted
    }
}

#[async_trait::async_trait]
impl PermissionProvider for StaticPermissions {
    async fn check_recognition_authorization(&self) -> bool {
        self.answer(self.recognition).await
    }

    async fn check_microphone(&self) -> bool {
        self.answer(self.microphone).await
    }
}
