use super::provider::RawCallback;
use super::types::{
    ConfidenceSpan, RawResult, RawTranscription, RecognitionEvent, TranscriptionAlternative,
};

/// Structured output for one recognizer callback
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// `None` only for a callback with neither result nor error
    pub event: Option<RecognitionEvent>,
    /// Present whenever the callback carried a result
    pub alternatives: Option<Vec<TranscriptionAlternative>>,
    /// Capture must be torn down (error or final result)
    pub teardown: bool,
}

impl Normalized {
    /// Output for a failure raised outside a recognizer callback
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            event: Some(RecognitionEvent::failure(message)),
            alternatives: None,
            teardown: true,
        }
    }

    pub fn is_error(&self) -> bool {
        self.event.as_ref().is_some_and(RecognitionEvent::is_error)
    }
}

/// Convert a raw recognizer callback into an event, the alternative list
/// and the teardown signal.
pub fn normalize(callback: RawCallback) -> Normalized {
    let RawCallback { result, error } = callback;

    let is_final = result.as_ref().is_some_and(|r| r.is_final);
    let teardown = is_final || error.is_some();
    let alternatives = result.as_ref().map(alternatives_of);

    let event = match (error, result) {
        (Some(error), _) => Some(RecognitionEvent::failure(error.to_string())),
        (None, Some(result)) => {
            let text = result
                .best_transcription()
                .map(|t| t.formatted_string.clone())
                .unwrap_or_default();
            Some(RecognitionEvent::transcript(text, result.is_final))
        }
        (None, None) => None,
    };

    Normalized {
        event,
        alternatives,
        teardown,
    }
}

fn alternatives_of(result: &RawResult) -> Vec<TranscriptionAlternative> {
    result.transcriptions.iter().map(alternative_of).collect()
}

fn alternative_of(transcription: &RawTranscription) -> TranscriptionAlternative {
    TranscriptionAlternative {
        text: transcription.formatted_string.clone(),
        confidence_spans: transcription
            .segments
            .iter()
            .map(|s| ConfidenceSpan {
                range: s.substring_range,
                confidence: clamp_confidence(s.confidence),
            })
            .collect(),
    }
}

fn clamp_confidence(confidence: f32) -> f32 {
    if confidence.is_nan() {
        return 0.0;
    }
    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::types::{RawSegment, TextRange};

    #[test]
    fn clamps_out_of_range_confidence() {
        let result = RawResult::new(
            vec![RawTranscription {
                formatted_string: "a b c".into(),
                segments: vec![
                    RawSegment {
                        substring_range: TextRange::new(0, 1),
                        confidence: 1.5,
                    },
                    RawSegment {
                        substring_range: TextRange::new(2, 1),
                        confidence: -0.2,
                    },
                    RawSegment {
                        substring_range: TextRange::new(4, 1),
                        confidence: f32::NAN,
                    },
                ],
            }],
            false,
        );

        let out = normalize(RawCallback::result(result));
        let spans = &out.alternatives.unwrap()[0].confidence_spans;
        let confidences: Vec<f32> = spans.iter().map(|s| s.confidence).collect();
        assert_eq!(confidences, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn result_without_transcriptions_yields_empty_text() {
        let out = normalize(RawCallback::result(RawResult::new(vec![], true)));

        assert_eq!(out.event, Some(RecognitionEvent::transcript("", true)));
        assert_eq!(out.alternatives, Some(vec![]));
        assert!(out.teardown);
    }
}
