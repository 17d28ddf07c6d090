use serde::{Deserialize, Serialize};

/// A span of text measured in UTF-16 code units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub length: usize,
}

impl TextRange {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    /// One past the last code unit, or `None` if that overflows
    pub fn end(&self) -> Option<usize> {
        self.start.checked_add(self.length)
    }
}

/// Confidence of one recognized segment of an alternative
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceSpan {
    pub range: TextRange,
    /// 0.0 (unsure) to 1.0 (certain)
    pub confidence: f32,
}

/// One candidate transcription of the audio heard so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionAlternative {
    pub text: String,
    /// Disjoint spans, left to right
    pub confidence_spans: Vec<ConfidenceSpan>,
}

/// Normalized form of a single recognizer callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionEvent {
    pub text: Option<String>,
    pub is_final: bool,
    pub error: Option<String>,
}

impl RecognitionEvent {
    pub fn transcript(text: impl Into<String>, is_final: bool) -> Self {
        Self {
            text: Some(text.into()),
            is_final,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            text: None,
            is_final: false,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// A final result carrying text; the only event that ends a session on its own
    pub fn completes_session(&self) -> bool {
        self.text.is_some() && self.is_final
    }
}

/// Recognizer hint about the kind of speech expected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskHint {
    Unspecified,
    #[default]
    Dictation,
    Search,
    Confirmation,
}

/// Parameters handed to the recognizer when a task begins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionRequest {
    pub locale: String,
    pub report_partial_results: bool,
    pub requires_on_device: bool,
    pub task_hint: TaskHint,
    pub contextual_strings: Vec<String>,
}

impl Default for RecognitionRequest {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            report_partial_results: true,
            requires_on_device: false,
            task_hint: TaskHint::Dictation,
            contextual_strings: Vec::new(),
        }
    }
}

// ============================================================================
// Raw recognizer payloads
// ============================================================================

/// A recognizer segment: a substring of a transcription with one confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub substring_range: TextRange,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTranscription {
    pub formatted_string: String,
    #[serde(default)]
    pub segments: Vec<RawSegment>,
}

impl RawTranscription {
    /// Build a transcription from space-separated words, one segment per word
    pub fn from_words(words: &[(&str, f32)]) -> Self {
        let mut formatted_string = String::new();
        let mut segments = Vec::with_capacity(words.len());
        let mut offset = 0;

        for (i, (word, confidence)) in words.iter().enumerate() {
            if i > 0 {
                formatted_string.push(' ');
                offset += 1;
            }
            let length = word.encode_utf16().count();
            formatted_string.push_str(word);
            segments.push(RawSegment {
                substring_range: TextRange::new(offset, length),
                confidence: *confidence,
            });
            offset += length;
        }

        Self {
            formatted_string,
            segments,
        }
    }
}

/// A recognition result as the platform delivers it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    /// Candidate transcriptions, best first
    pub transcriptions: Vec<RawTranscription>,
    #[serde(default)]
    pub is_final: bool,
}

impl RawResult {
    pub fn new(transcriptions: Vec<RawTranscription>, is_final: bool) -> Self {
        Self {
            transcriptions,
            is_final,
        }
    }

    pub fn best_transcription(&self) -> Option<&RawTranscription> {
        self.transcriptions.first()
    }
}
