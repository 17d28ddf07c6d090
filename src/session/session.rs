use super::config::SessionConfig;
use super::observable::Observable;
use super::projector::SessionProjector;
use super::stats::{SessionStats, StatsCounters};
use super::status::{Command, SessionStatus};
use crate::audio::AudioBackend;
use crate::recognition::{
    normalize, Normalized, PermissionProvider, RawCallback, RecognitionEvent, RecognitionTask,
    Recognizer, RecognizerError, TranscriptionAlternative,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

/// What a call to `start` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// Capture and recognition are running
    Started,
    /// A session was already active or activating, or the indicator was not
    /// `Idle`; nothing changed
    AlreadyActive,
    /// `stop` arrived while permission checks were pending
    Cancelled,
    /// The attempt failed and was torn down; the error was also emitted as an event
    Failed(RecognizerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Waiting on permission and availability checks
    Activating,
    Active,
}

struct Inner {
    capture: Box<dyn AudioBackend>,
    phase: Phase,
    /// Bumped by every start and every teardown. Pending starts and
    /// callbacks tagged with an older epoch are discarded.
    epoch: u64,
    task: Option<Box<dyn RecognitionTask>>,
    /// Mirrors `phase != Idle` for waiters
    active: Observable<bool>,
    started_at: Option<DateTime<Utc>>,
    counters: StatsCounters,
}

impl Inner {
    /// Cancel the recognition task and stop the capture.
    ///
    /// Safe to call any number of times. Returns whether a task was released.
    async fn teardown(&mut self) -> bool {
        self.epoch += 1;
        self.phase = Phase::Idle;
        self.active.set(false);

        let released = match self.task.take() {
            Some(mut task) => {
                task.cancel();
                true
            }
            None => false,
        };

        if let Err(e) = self.capture.stop().await {
            warn!("Failed to stop audio capture ({}): {:#}", self.capture.name(), e);
        }

        released
    }
}

struct Shared {
    config: SessionConfig,
    recognizer: Arc<dyn Recognizer>,
    permissions: Arc<dyn PermissionProvider>,
    projector: SessionProjector,
    inner: Mutex<Inner>,
}

/// A transcription session driving one capture backend and one recognizer
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct TranscriptionSession {
    shared: Arc<Shared>,
}

impl TranscriptionSession {
    /// Create a new session. The capture backend is owned by the session from here on.
    pub fn new(
        config: SessionConfig,
        capture: Box<dyn AudioBackend>,
        recognizer: Arc<dyn Recognizer>,
        permissions: Arc<dyn PermissionProvider>,
    ) -> Self {
        info!(
            "Creating transcription session: {} (capture: {}, recognizer: {})",
            config.session_id,
            capture.name(),
            recognizer.name()
        );

        let projector = SessionProjector::new(config.event_capacity);

        Self {
            shared: Arc::new(Shared {
                config,
                recognizer,
                permissions,
                projector,
                inner: Mutex::new(Inner {
                    capture,
                    phase: Phase::Idle,
                    epoch: 0,
                    task: None,
                    active: Observable::new(false),
                    started_at: None,
                    counters: StatsCounters::default(),
                }),
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.shared.config.session_id
    }

    /// Start capturing and recognizing
    ///
    /// The status turns `Recording` immediately, before the permission checks
    /// resolve. A second `start` while one is pending or active is ignored,
    /// as is a `start` while the indicator still shows a torn-down session
    /// (see `SessionConfig::idle_on_error`).
    pub async fn start(&self) -> StartOutcome {
        let session_id = self.session_id();

        let epoch = {
            let mut inner = self.shared.inner.lock().await;
            let status = self.shared.projector.status();
            if inner.phase != Phase::Idle || status.on_command(Command::Start).is_none() {
                warn!(
                    "Transcription session {} already active ({})",
                    session_id, status
                );
                return StartOutcome::AlreadyActive;
            }

            info!("Starting transcription session: {}", session_id);

            inner.epoch += 1;
            inner.phase = Phase::Activating;
            inner.active.set(true);
            inner.started_at = Some(Utc::now());
            inner.counters.sessions_started += 1;
            self.shared.projector.set_status(SessionStatus::Recording);
            inner.epoch
        };

        // Lock released: `stop` may run while the checks are pending
        let gate = self.shared.check_gate().await;

        let mut inner = self.shared.inner.lock().await;
        if inner.epoch != epoch || inner.phase != Phase::Activating {
            info!(
                "Start of session {} cancelled while permission checks were pending",
                session_id
            );
            return StartOutcome::Cancelled;
        }

        let activated = match gate {
            Ok(()) => activate(&self.shared, &mut inner, epoch).await,
            Err(e) => Err(e),
        };

        match activated {
            Ok(()) => {
                info!("Transcription session {} started successfully", session_id);
                StartOutcome::Started
            }
            Err(e) => {
                self.shared.fail(&mut inner, e.clone()).await;
                StartOutcome::Failed(e)
            }
        }
    }

    /// Stop capturing and recognizing. Stopping an idle session is a no-op.
    pub async fn stop(&self) -> SessionStats {
        let mut inner = self.shared.inner.lock().await;

        let was_idle = inner.phase == Phase::Idle;
        let released = inner.teardown().await;

        if was_idle && !released {
            warn!("Transcription session {} not active", self.session_id());
        } else {
            info!("Transcription session {} stopped", self.session_id());
        }

        self.shared.projector.set_status(SessionStatus::Idle);
        self.shared.stats(&inner)
    }

    /// Record-button press: start when idle, stop otherwise
    pub async fn toggle(&self) {
        match self.shared.projector.status().toggle_command() {
            Command::Start => {
                self.start().await;
            }
            Command::Stop => {
                self.stop().await;
            }
        }
    }

    /// Mark an active session as receiving results (`Recording` → `Recognizing`).
    /// Returns whether the status changed.
    pub async fn mark_recognizing(&self) -> bool {
        let inner = self.shared.inner.lock().await;
        if inner.phase != Phase::Active || self.shared.projector.status() != SessionStatus::Recording
        {
            return false;
        }
        self.shared.projector.set_status(SessionStatus::Recognizing);
        true
    }

    /// Deliver a recognizer callback to the active session directly.
    ///
    /// Returns whether the session keeps listening afterwards; callbacks
    /// arriving with no active session are dropped.
    pub async fn handle_callback(&self, callback: RawCallback) -> bool {
        self.shared.dispatch(None, callback).await
    }

    /// Whether a session is activating or active
    pub async fn is_active(&self) -> bool {
        self.shared.inner.lock().await.phase != Phase::Idle
    }

    /// Wait until no session is activating or active.
    ///
    /// Unlike waiting for `Idle` status, this also returns after an error
    /// tore the session down while the indicator stays put.
    pub async fn wait_inactive(&self) {
        let mut active = self.shared.inner.lock().await.active.subscribe();
        while *active.borrow_and_update() {
            if active.changed().await.is_err() {
                break;
            }
        }
    }

    pub fn current_status(&self) -> SessionStatus {
        self.shared.projector.status()
    }

    pub fn live_text(&self) -> watch::Receiver<Option<String>> {
        self.shared.projector.subscribe_live_text()
    }

    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.shared.projector.subscribe_status()
    }

    pub fn history(&self) -> watch::Receiver<Vec<TranscriptionAlternative>> {
        self.shared.projector.subscribe_history()
    }

    pub fn last_error(&self) -> watch::Receiver<Option<String>> {
        self.shared.projector.subscribe_last_error()
    }

    pub fn events(&self) -> broadcast::Receiver<RecognitionEvent> {
        self.shared.projector.subscribe_events()
    }

    /// Get current session statistics
    pub async fn get_stats(&self) -> SessionStats {
        let inner = self.shared.inner.lock().await;
        self.shared.stats(&inner)
    }
}

impl Shared {
    /// Recognizer exists → recognition authorized → microphone permitted → recognizer available
    async fn check_gate(&self) -> Result<(), RecognizerError> {
        if !self.recognizer.supports_locale(&self.config.request.locale) {
            return Err(RecognizerError::NoRecognizer);
        }
        if !self.permissions.check_recognition_authorization().await {
            return Err(RecognizerError::NotAuthorized);
        }
        if !self.permissions.check_microphone().await {
            return Err(RecognizerError::NotPermitted);
        }
        if !self.recognizer.is_available() {
            return Err(RecognizerError::RecognizerUnavailable);
        }
        Ok(())
    }

    async fn dispatch(&self, epoch: Option<u64>, callback: RawCallback) -> bool {
        let mut inner = self.inner.lock().await;

        let expected = epoch.unwrap_or(inner.epoch);
        if inner.phase != Phase::Active || inner.epoch != expected {
            debug!("Discarding callback from inactive recognition task");
            return false;
        }

        inner.counters.callbacks_received += 1;

        let normalized = normalize(callback);
        if normalized.event.is_none() {
            debug!("Recognizer callback carried neither result nor error");
            return true;
        }

        if normalized.is_error() {
            error!(
                "Recognition failed in session {}: {}",
                self.config.session_id,
                normalized
                    .event
                    .as_ref()
                    .and_then(|e| e.error.as_deref())
                    .unwrap_or_default()
            );
        }

        self.apply(&mut inner, &normalized).await;
        !normalized.teardown
    }

    async fn fail(&self, inner: &mut Inner, error: RecognizerError) {
        error!(
            "Transcription session {} failed: {}",
            self.config.session_id, error
        );
        self.apply(inner, &Normalized::from_error(error.to_string()))
            .await;
    }

    async fn apply(&self, inner: &mut Inner, normalized: &Normalized) {
        inner.counters.record(normalized);

        if normalized.teardown {
            inner.teardown().await;
            if normalized.is_error() && self.config.idle_on_error {
                self.projector.set_status(SessionStatus::Idle);
            }
        }

        self.projector.apply(normalized);
    }

    /// Called when a task's result stream ends
    async fn finish(&self, epoch: u64) {
        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch || inner.phase != Phase::Active {
            return;
        }

        warn!(
            "Recognition task for session {} ended without a final result",
            self.config.session_id
        );
        inner.teardown().await;
        self.projector.set_status(SessionStatus::Idle);
    }

    fn stats(&self, inner: &Inner) -> SessionStats {
        let duration_secs = inner
            .started_at
            .map(|t| Utc::now().signed_duration_since(t).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        SessionStats {
            session_id: self.config.session_id.clone(),
            status: self.projector.status(),
            started_at: inner.started_at,
            duration_secs,
            sessions_started: inner.counters.sessions_started,
            callbacks_received: inner.counters.callbacks_received,
            partial_results: inner.counters.partial_results,
            final_results: inner.counters.final_results,
            errors: inner.counters.errors,
            history_len: self.projector.history().len(),
        }
    }
}

/// Prepare and start the capture, begin a recognition task, and spawn the
/// task that feeds its callbacks back into the session
async fn activate(
    shared: &Arc<Shared>,
    inner: &mut Inner,
    epoch: u64,
) -> Result<(), RecognizerError> {
    inner
        .capture
        .prepare()
        .await
        .context("Failed to prepare audio capture")
        .map_err(|e| RecognizerError::underlying(&e))?;

    let audio = inner
        .capture
        .start()
        .await
        .context("Failed to start audio capture")
        .map_err(|e| RecognizerError::underlying(&e))?;

    let (results_tx, results_rx) = mpsc::channel(32);
    let task = shared
        .recognizer
        .recognize(shared.config.request.clone(), audio, results_tx)
        .await?;

    inner.task = Some(task);
    inner.phase = Phase::Active;

    let pump_shared = Arc::clone(shared);
    tokio::spawn(async move {
        pump(pump_shared, epoch, results_rx).await;
    });

    Ok(())
}

/// Apply one task's callbacks in order until it finishes or is torn down
async fn pump(shared: Arc<Shared>, epoch: u64, mut results: mpsc::Receiver<RawCallback>) {
    debug!("Recognition pump started (epoch {})", epoch);

    while let Some(callback) = results.recv().await {
        if !shared.dispatch(Some(epoch), callback).await {
            break;
        }
    }

    shared.finish(epoch).await;
    debug!("Recognition pump stopped (epoch {})", epoch);
}
