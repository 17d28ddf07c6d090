use tokio::sync::{broadcast, watch};
use tracing::debug;

use super::observable::Observable;
use super::status::SessionStatus;
use crate::recognition::{Normalized, RecognitionEvent, TranscriptionAlternative};

/// Projects normalized recognizer output onto the session's observable state
///
/// - live text follows every event that carries text; errors leave it alone
/// - a final event with text returns the status to Idle
/// - every result replaces the history with its alternatives
pub struct SessionProjector {
    live_text: Observable<Option<String>>,
    status: Observable<SessionStatus>,
    history: Observable<Vec<TranscriptionAlternative>>,
    last_error: Observable<Option<String>>,
    events: broadcast::Sender<RecognitionEvent>,
}

impl SessionProjector {
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            live_text: Observable::new(None),
            status: Observable::new(SessionStatus::Idle),
            history: Observable::new(Vec::new()),
            last_error: Observable::new(None),
            events,
        }
    }

    /// Apply one normalized callback
    pub fn apply(&self, normalized: &Normalized) {
        if let Some(alternatives) = &normalized.alternatives {
            self.history.set(alternatives.clone());
        }

        if let Some(event) = &normalized.event {
            self.apply_event(event);
        }
    }

    fn apply_event(&self, event: &RecognitionEvent) {
        if let Some(text) = &event.text {
            self.live_text.set(Some(text.clone()));
        }

        if event.completes_session() {
            self.set_status(SessionStatus::Idle);
        }

        if let Some(message) = &event.error {
            self.last_error.set(Some(message.clone()));
        }

        // No subscribers is fine
        let _ = self.events.send(event.clone());
    }

    pub fn set_status(&self, status: SessionStatus) {
        let previous = self.status.get();
        if self.status.set(status) {
            debug!("Session status: {} -> {}", previous, status);
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status.get()
    }

    pub fn live_text(&self) -> Option<String> {
        self.live_text.get()
    }

    pub fn history(&self) -> Vec<TranscriptionAlternative> {
        self.history.get()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.get()
    }

    pub fn subscribe_live_text(&self) -> watch::Receiver<Option<String>> {
        self.live_text.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_history(&self) -> watch::Receiver<Vec<TranscriptionAlternative>> {
        self.history.subscribe()
    }

    pub fn subscribe_last_error(&self) -> watch::Receiver<Option<String>> {
        self.last_error.subscribe()
    }

    /// Event stream without replay: only events sent after subscribing arrive
    pub fn subscribe_events(&self) -> broadcast::Receiver<RecognitionEvent> {
        self.events.subscribe()
    }
}
