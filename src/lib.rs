pub mod audio;
pub mod config;
pub mod recognition;
pub mod session;

pub use audio::{AudioBackend, AudioBackendConfig, AudioFrame, CaptureProbe, SyntheticBackend};
pub use config::Config;
pub use recognition::{
    normalize, ConfidenceSpan, Normalized, PermissionProvider, RawCallback, RawResult,
    RawTranscription, RecognitionEvent, RecognitionRequest, RecognitionTask, Recognizer,
    RecognizerError, ScriptStep, ScriptedRecognizer, StaticPermissions, TextRange, TextRun,
    TranscriptionAlternative,
};
pub use session::{
    SessionConfig, SessionProjector, SessionStats, SessionStatus, StartOutcome,
    TranscriptionSession,
};
