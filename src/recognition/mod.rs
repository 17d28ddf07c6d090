//! Speech recognition: collaborator contracts, raw payloads and their
//! normalization into session events.

pub mod confidence;
pub mod error;
pub mod normalizer;
pub mod provider;
pub mod scripted;
pub mod types;

pub use confidence::{confidence_hue, TextRun};
pub use error::RecognizerError;
pub use normalizer::{normalize, Normalized};
pub use provider::{PermissionProvider, RawCallback, RecognitionTask, Recognizer};
pub use scripted::{
    load_script, RecognizerProbe, ScriptStep, ScriptedCallback, ScriptedRecognizer,
    StaticPermissions,
};
pub use types::{
    ConfidenceSpan, RawResult, RawSegment, RawTranscription, RecognitionEvent,
    RecognitionRequest, TaskHint, TextRange, TranscriptionAlternative,
};
