// Integration tests for the transcription session lifecycle
//
// These tests drive a full session with the synthetic capture backend and
// the scripted recognizer, checking the start/stop table, teardown, the
// permission gate and what the observable outputs show afterwards.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use transcription_session::recognition::{RecognizerProbe, TaskHint};
use transcription_session::{
    AudioBackendConfig, AudioFrame, CaptureProbe, RawCallback, RawResult, RawTranscription,
    RecognitionRequest, RecognitionTask, Recognizer, RecognizerError, ScriptStep,
    ScriptedRecognizer, SessionConfig, SessionStatus, StartOutcome, StaticPermissions,
    SyntheticBackend, TranscriptionSession,
};

const WAIT: Duration = Duration::from_secs(5);

fn transcription(text: &str) -> RawTranscription {
    let words: Vec<(&str, f32)> = text.split(' ').map(|w| (w, 0.75)).collect();
    RawTranscription::from_words(&words)
}

fn backend_config() -> AudioBackendConfig {
    AudioBackendConfig {
        target_sample_rate: 16000,
        target_channels: 1,
        buffer_size: 160, // 10ms buffers
    }
}

struct Harness {
    session: TranscriptionSession,
    capture: CaptureProbe,
    recognizer: RecognizerProbe,
}

fn harness_with(
    config: SessionConfig,
    recognizer: ScriptedRecognizer,
    permissions: StaticPermissions,
) -> Harness {
    let backend = SyntheticBackend::new(backend_config());
    let capture = backend.probe();
    let recognizer_probe = recognizer.probe();

    let session = TranscriptionSession::new(
        config,
        Box::new(backend),
        Arc::new(recognizer),
        Arc::new(permissions),
    );

    Harness {
        session,
        capture,
        recognizer: recognizer_probe,
    }
}

fn harness(steps: Vec<ScriptStep>) -> Harness {
    harness_with(
        SessionConfig::default(),
        ScriptedRecognizer::new(steps),
        StaticPermissions::granted(),
    )
}

/// A script that stays silent long enough for the test to finish
fn quiet_script() -> Vec<ScriptStep> {
    vec![ScriptStep::partial(vec![transcription("never heard")]).after(60_000)]
}

async fn wait_for_status(rx: &mut watch::Receiver<SessionStatus>, wanted: SessionStatus) {
    tokio::time::timeout(WAIT, async {
        while *rx.borrow_and_update() != wanted {
            rx.changed().await.expect("session dropped");
        }
    })
    .await
    .expect("timed out waiting for status");
}

async fn wait_for_error(rx: &mut watch::Receiver<Option<String>>) -> String {
    tokio::time::timeout(WAIT, async {
        loop {
            if let Some(message) = rx.borrow_and_update().clone() {
                return message;
            }
            rx.changed().await.expect("session dropped");
        }
    })
    .await
    .expect("timed out waiting for error")
}

#[tokio::test]
async fn test_partial_then_final_ends_idle_with_final_text() -> Result<()> {
    let h = harness(vec![
        ScriptStep::partial(vec![transcription("a")]),
        ScriptStep::final_result(vec![transcription("a b")]).after(20),
    ]);
    let mut status = h.session.status();

    assert_eq!(h.session.start().await, StartOutcome::Started);
    wait_for_status(&mut status, SessionStatus::Idle).await;

    assert_eq!(h.session.live_text().borrow().as_deref(), Some("a b"));
    assert!(!h.session.is_active().await);
    assert_eq!(h.capture.stops(), 1, "final result tears down capture");
    assert!(!h.capture.is_capturing());
    assert_eq!(h.recognizer.cancels(), 1);

    let stats = h.session.get_stats().await;
    assert_eq!(stats.partial_results, 1);
    assert_eq!(stats.final_results, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.callbacks_received, 2);

    Ok(())
}

#[tokio::test]
async fn test_history_holds_latest_pass_only() -> Result<()> {
    let h = harness(vec![
        ScriptStep::partial(vec![transcription("x")]),
        ScriptStep::final_result(vec![transcription("y"), transcription("z")]).after(20),
    ]);
    let mut status = h.session.status();

    h.session.start().await;
    wait_for_status(&mut status, SessionStatus::Idle).await;

    let texts: Vec<String> = h
        .session
        .history()
        .borrow()
        .iter()
        .map(|a| a.text.clone())
        .collect();
    assert_eq!(texts, vec!["y", "z"]);

    Ok(())
}

#[tokio::test]
async fn test_stop_twice_equals_stop_once() -> Result<()> {
    let h = harness(quiet_script());

    assert_eq!(h.session.start().await, StartOutcome::Started);
    assert!(h.capture.is_capturing());

    let first = h.session.stop().await;
    let second = h.session.stop().await;

    assert_eq!(first.status, SessionStatus::Idle);
    assert_eq!(second.status, SessionStatus::Idle);
    assert!(!h.session.is_active().await);
    assert!(!h.capture.is_capturing());
    assert_eq!(h.capture.stops(), 1);
    assert_eq!(h.recognizer.cancels(), 1);

    Ok(())
}

#[tokio::test]
async fn test_stop_when_never_started_is_noop() -> Result<()> {
    let h = harness(quiet_script());

    let stats = h.session.stop().await;

    assert_eq!(stats.status, SessionStatus::Idle);
    assert_eq!(stats.sessions_started, 0);
    assert_eq!(h.capture.stops(), 0);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_starts_create_one_session() -> Result<()> {
    let h = harness_with(
        SessionConfig::default(),
        ScriptedRecognizer::new(quiet_script()),
        StaticPermissions::granted().with_delay(Duration::from_millis(50)),
    );

    let (a, b) = tokio::join!(h.session.start(), h.session.start());

    let outcomes = [a, b];
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == StartOutcome::Started)
            .count(),
        1
    );
    assert!(outcomes.contains(&StartOutcome::AlreadyActive));
    assert_eq!(h.capture.starts(), 1);
    assert_eq!(h.recognizer.tasks_started(), 1);

    h.session.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_stop_while_permission_check_pending_cancels_start() -> Result<()> {
    let h = harness_with(
        SessionConfig::default(),
        ScriptedRecognizer::new(quiet_script()),
        StaticPermissions::granted().with_delay(Duration::from_millis(100)),
    );

    let starter = {
        let session = h.session.clone();
        tokio::spawn(async move { session.start().await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.session.current_status(), SessionStatus::Recording);

    h.session.stop().await;
    assert_eq!(starter.await?, StartOutcome::Cancelled);

    assert_eq!(h.session.current_status(), SessionStatus::Idle);
    assert!(!h.session.is_active().await);
    assert_eq!(h.capture.starts(), 0);
    assert_eq!(h.recognizer.tasks_started(), 0);

    Ok(())
}

#[tokio::test]
async fn test_restart_after_cancelled_start_runs_once() -> Result<()> {
    let h = harness_with(
        SessionConfig::default(),
        ScriptedRecognizer::new(quiet_script()),
        StaticPermissions::granted().with_delay(Duration::from_millis(60)),
    );

    let first = {
        let session = h.session.clone();
        tokio::spawn(async move { session.start().await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    h.session.stop().await;

    // Start again before the first attempt's checks resolve
    let second = h.session.start().await;

    assert_eq!(first.await?, StartOutcome::Cancelled);
    assert_eq!(second, StartOutcome::Started);
    assert_eq!(h.capture.starts(), 1);
    assert_eq!(h.recognizer.tasks_started(), 1);

    h.session.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_error_keeps_last_text_and_reports_error() -> Result<()> {
    let h = harness(vec![
        ScriptStep::partial(vec![transcription("hello")]),
        ScriptStep::error("network down").after(20),
    ]);
    let mut events = h.session.events();
    let mut status = h.session.status();
    let mut last_error = h.session.last_error();

    h.session.start().await;
    assert_eq!(wait_for_error(&mut last_error).await, "network down");
    wait_for_status(&mut status, SessionStatus::Idle).await;

    assert_eq!(h.session.live_text().borrow().as_deref(), Some("hello"));
    assert_eq!(h.session.history().borrow()[0].text, "hello");
    assert!(!h.session.is_active().await);
    assert_eq!(h.capture.stops(), 1);

    let first = events.recv().await?;
    assert_eq!(first.text.as_deref(), Some("hello"));
    let second = events.recv().await?;
    assert_eq!(second.error.as_deref(), Some("network down"));
    assert_eq!(second.text, None);

    assert_eq!(h.session.get_stats().await.errors, 1);

    Ok(())
}

#[tokio::test]
async fn test_error_without_idle_policy_leaves_status() -> Result<()> {
    let config = SessionConfig {
        idle_on_error: false,
        ..SessionConfig::default()
    };
    let h = harness_with(
        config,
        ScriptedRecognizer::new(vec![ScriptStep::error("network down").after(10)]),
        StaticPermissions::granted(),
    );
    let mut last_error = h.session.last_error();

    h.session.start().await;
    wait_for_error(&mut last_error).await;

    // Capture is gone even though the indicator still shows Recording
    assert_eq!(h.session.current_status(), SessionStatus::Recording);
    assert!(!h.session.is_active().await);
    assert!(!h.capture.is_capturing());

    // The next button press issues stop
    h.session.toggle().await;
    assert_eq!(h.session.current_status(), SessionStatus::Idle);
    assert_eq!(h.recognizer.tasks_started(), 1);

    Ok(())
}

#[tokio::test]
async fn test_wait_inactive_returns_after_error_without_idle_policy() -> Result<()> {
    let config = SessionConfig {
        idle_on_error: false,
        ..SessionConfig::default()
    };
    let h = harness_with(
        config,
        ScriptedRecognizer::new(vec![ScriptStep::error("network down").after(10)]),
        StaticPermissions::granted(),
    );

    assert_eq!(h.session.start().await, StartOutcome::Started);
    tokio::time::timeout(WAIT, h.session.wait_inactive()).await?;

    assert_eq!(h.session.current_status(), SessionStatus::Recording);
    assert_eq!(
        h.session.last_error().borrow().as_deref(),
        Some("network down")
    );

    Ok(())
}

#[tokio::test]
async fn test_start_rejected_until_stale_indicator_is_stopped() -> Result<()> {
    let config = SessionConfig {
        idle_on_error: false,
        ..SessionConfig::default()
    };
    let h = harness_with(
        config,
        ScriptedRecognizer::new(quiet_script()),
        StaticPermissions::new(true, false),
    );

    assert_eq!(
        h.session.start().await,
        StartOutcome::Failed(RecognizerError::NotPermitted)
    );
    // Already torn down, nothing to wait for
    tokio::time::timeout(WAIT, h.session.wait_inactive()).await?;
    assert_eq!(h.session.current_status(), SessionStatus::Recording);

    // The indicator still shows Recording, so start does not apply
    assert_eq!(h.session.start().await, StartOutcome::AlreadyActive);
    assert_eq!(h.session.get_stats().await.sessions_started, 1);

    h.session.stop().await;
    assert_eq!(
        h.session.start().await,
        StartOutcome::Failed(RecognizerError::NotPermitted)
    );
    assert_eq!(h.session.get_stats().await.sessions_started, 2);
    assert_eq!(h.capture.starts(), 0);

    Ok(())
}

#[tokio::test]
async fn test_gate_failures_map_to_errors() -> Result<()> {
    let cases: Vec<(ScriptedRecognizer, StaticPermissions, RecognizerError)> = vec![
        (
            ScriptedRecognizer::new(vec![]).with_locales(&["fr-FR"]),
            StaticPermissions::granted(),
            RecognizerError::NoRecognizer,
        ),
        (
            ScriptedRecognizer::new(vec![]),
            StaticPermissions::new(false, true),
            RecognizerError::NotAuthorized,
        ),
        (
            ScriptedRecognizer::new(vec![]),
            StaticPermissions::new(true, false),
            RecognizerError::NotPermitted,
        ),
        (
            {
                let r = ScriptedRecognizer::new(vec![]);
                r.set_available(false);
                r
            },
            StaticPermissions::granted(),
            RecognizerError::RecognizerUnavailable,
        ),
    ];

    for (recognizer, permissions, expected) in cases {
        let h = harness_with(SessionConfig::default(), recognizer, permissions);
        let mut events = h.session.events();

        let outcome = h.session.start().await;

        assert_eq!(outcome, StartOutcome::Failed(expected.clone()));
        assert_eq!(h.session.current_status(), SessionStatus::Idle);
        assert!(!h.session.is_active().await);
        assert_eq!(h.capture.starts(), 0);
        assert_eq!(h.recognizer.tasks_started(), 0);
        assert_eq!(
            h.session.last_error().borrow().as_deref(),
            Some(expected.to_string().as_str())
        );
        assert_eq!(
            events.try_recv()?.error,
            Some(expected.to_string()),
            "error delivered as an event"
        );
    }

    Ok(())
}

#[tokio::test]
async fn test_capture_failure_is_underlying_error() -> Result<()> {
    let recognizer = ScriptedRecognizer::new(quiet_script());
    let recognizer_probe = recognizer.probe();
    let session = TranscriptionSession::new(
        SessionConfig::default(),
        Box::new(SyntheticBackend::failing(backend_config(), "input busy")),
        Arc::new(recognizer),
        Arc::new(StaticPermissions::granted()),
    );

    let outcome = session.start().await;

    assert_eq!(
        outcome,
        StartOutcome::Failed(RecognizerError::Underlying(
            "Failed to start audio capture: input busy".to_string()
        ))
    );
    assert_eq!(session.current_status(), SessionStatus::Idle);
    assert_eq!(recognizer_probe.tasks_started(), 0);

    Ok(())
}

#[tokio::test]
async fn test_second_start_while_active_is_ignored() -> Result<()> {
    let h = harness(quiet_script());

    assert_eq!(h.session.start().await, StartOutcome::Started);
    assert_eq!(h.session.start().await, StartOutcome::AlreadyActive);
    assert_eq!(h.capture.starts(), 1);

    h.session.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_toggle_follows_record_button_table() -> Result<()> {
    let h = harness(quiet_script());

    h.session.toggle().await;
    assert_eq!(h.session.current_status(), SessionStatus::Recording);
    assert!(h.session.is_active().await);

    h.session.toggle().await;
    assert_eq!(h.session.current_status(), SessionStatus::Idle);
    assert!(!h.session.is_active().await);

    Ok(())
}

#[tokio::test]
async fn test_recognizing_stops_like_recording() -> Result<()> {
    let h = harness(quiet_script());

    assert!(!h.session.mark_recognizing().await, "idle session");

    h.session.start().await;
    assert!(h.session.mark_recognizing().await);
    assert_eq!(h.session.current_status(), SessionStatus::Recognizing);
    assert!(!h.session.mark_recognizing().await, "already recognizing");

    h.session.toggle().await;
    assert_eq!(h.session.current_status(), SessionStatus::Idle);
    assert_eq!(h.capture.stops(), 1);

    Ok(())
}

#[tokio::test]
async fn test_injected_callbacks_drive_active_session() -> Result<()> {
    let h = harness(quiet_script());

    // Nothing listens yet
    assert!(
        !h.session
            .handle_callback(RawCallback::result(RawResult::new(
                vec![transcription("ignored")],
                false
            )))
            .await
    );
    assert_eq!(*h.session.live_text().borrow(), None);

    h.session.start().await;

    let keep_listening = h
        .session
        .handle_callback(RawCallback::result(RawResult::new(
            vec![transcription("typed in")],
            false,
        )))
        .await;
    assert!(keep_listening);
    assert_eq!(h.session.live_text().borrow().as_deref(), Some("typed in"));

    // Neither result nor error: ignored, session keeps listening
    assert!(h.session.handle_callback(RawCallback::default()).await);

    let keep_listening = h
        .session
        .handle_callback(RawCallback::result(RawResult::new(
            vec![transcription("typed in full")],
            true,
        )))
        .await;
    assert!(!keep_listening);
    assert_eq!(h.session.current_status(), SessionStatus::Idle);
    assert_eq!(h.capture.stops(), 1);

    Ok(())
}

#[tokio::test]
async fn test_script_ending_without_final_returns_to_idle() -> Result<()> {
    let h = harness(vec![ScriptStep::partial(vec![transcription("trailing off")])]);
    let mut status = h.session.status();

    h.session.start().await;
    wait_for_status(&mut status, SessionStatus::Idle).await;

    assert_eq!(
        h.session.live_text().borrow().as_deref(),
        Some("trailing off")
    );
    assert!(!h.session.is_active().await);
    assert!(!h.capture.is_capturing());

    Ok(())
}

#[tokio::test]
async fn test_request_settings_reach_recognizer() -> Result<()> {
    let config = SessionConfig {
        request: RecognitionRequest {
            locale: "en-GB".to_string(),
            contextual_strings: vec!["Riley".to_string(), "Brioche".to_string()],
            ..RecognitionRequest::default()
        },
        ..SessionConfig::default()
    };
    let h = harness_with(
        config,
        ScriptedRecognizer::new(quiet_script()).with_locales(&["en-GB"]),
        StaticPermissions::granted(),
    );

    assert_eq!(h.session.start().await, StartOutcome::Started);

    let request = h.recognizer.last_request().expect("request recorded");
    assert_eq!(request.locale, "en-GB");
    assert_eq!(request.contextual_strings, vec!["Riley", "Brioche"]);
    assert!(request.report_partial_results);
    assert!(!request.requires_on_device);
    assert_eq!(request.task_hint, TaskHint::Dictation);

    h.session.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_new_session_after_final_starts_fresh_task() -> Result<()> {
    let h = harness(vec![ScriptStep::final_result(vec![transcription("one")])]);
    let mut status = h.session.status();

    h.session.start().await;
    wait_for_status(&mut status, SessionStatus::Idle).await;

    assert_eq!(h.session.start().await, StartOutcome::Started);
    wait_for_status(&mut status, SessionStatus::Idle).await;

    assert_eq!(h.recognizer.tasks_started(), 2);
    assert_eq!(h.capture.starts(), 2);
    assert_eq!(h.capture.stops(), 2);
    assert_eq!(h.session.get_stats().await.sessions_started, 2);

    Ok(())
}

/// Recognizer whose tasks ignore `cancel` and keep their result senders,
/// so a superseded task can still deliver callbacks
#[derive(Default)]
struct LingeringRecognizer {
    senders: std::sync::Mutex<Vec<mpsc::Sender<RawCallback>>>,
}

impl LingeringRecognizer {
    fn sender(&self, index: usize) -> mpsc::Sender<RawCallback> {
        self.senders.lock().unwrap()[index].clone()
    }
}

struct LingeringTask;

impl RecognitionTask for LingeringTask {
    fn cancel(&mut self) {}
}

#[async_trait::async_trait]
impl Recognizer for LingeringRecognizer {
    fn supports_locale(&self, _locale: &str) -> bool {
        true
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn recognize(
        &self,
        _request: RecognitionRequest,
        _audio: mpsc::Receiver<AudioFrame>,
        results: mpsc::Sender<RawCallback>,
    ) -> Result<Box<dyn RecognitionTask>, RecognizerError> {
        self.senders.lock().unwrap().push(results);
        Ok(Box::new(LingeringTask))
    }

    fn name(&self) -> &str {
        "lingering"
    }
}

#[tokio::test]
async fn test_callbacks_from_superseded_task_are_discarded() -> Result<()> {
    let recognizer = Arc::new(LingeringRecognizer::default());
    let session = TranscriptionSession::new(
        SessionConfig::default(),
        Box::new(SyntheticBackend::new(backend_config())),
        recognizer.clone(),
        Arc::new(StaticPermissions::granted()),
    );

    assert_eq!(session.start().await, StartOutcome::Started);
    session.stop().await;
    assert_eq!(session.start().await, StartOutcome::Started);

    // The first task answers after it was cancelled
    recognizer
        .sender(0)
        .send(RawCallback::result(RawResult::new(
            vec![transcription("stale")],
            true,
        )))
        .await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(*session.live_text().borrow(), None);
    assert_eq!(session.current_status(), SessionStatus::Recording);
    assert!(session.is_active().await);
    assert_eq!(session.get_stats().await.callbacks_received, 0);

    // The current task is still heard
    let mut status = session.status();
    recognizer
        .sender(1)
        .send(RawCallback::result(RawResult::new(
            vec![transcription("fresh")],
            true,
        )))
        .await?;
    wait_for_status(&mut status, SessionStatus::Idle).await;
    assert_eq!(session.live_text().borrow().as_deref(), Some("fresh"));

    Ok(())
}
