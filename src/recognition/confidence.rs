//! Confidence annotation of transcription alternatives.
//!
//! Splits an alternative's text into runs so a view can tint each recognized
//! segment by confidence: red (0.0) through yellow to green (1.0).

use serde::Serialize;
use tracing::warn;

use super::types::{ConfidenceSpan, TranscriptionAlternative};

/// A contiguous piece of an alternative's text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRun {
    pub text: String,
    /// `None` for text no segment covers (usually whitespace)
    pub confidence: Option<f32>,
}

impl TextRun {
    /// Hue on the 0.0..=1.0 colour wheel, if the run carries a confidence
    pub fn hue(&self) -> Option<f32> {
        self.confidence.map(confidence_hue)
    }
}

/// Map a confidence to a hue: 0.0 is red, 1/3 is green
pub fn confidence_hue(confidence: f32) -> f32 {
    confidence.clamp(0.0, 1.0) / 3.0
}

impl ConfidenceSpan {
    pub fn hue(&self) -> f32 {
        confidence_hue(self.confidence)
    }
}

impl TranscriptionAlternative {
    /// Split the text into runs at span boundaries.
    ///
    /// Span ranges are UTF-16 offsets. Spans that fall outside the text,
    /// split a surrogate pair, or overlap an earlier span are skipped.
    pub fn runs(&self) -> Vec<TextRun> {
        let boundaries = utf16_boundaries(&self.text);
        let mut runs = Vec::with_capacity(self.confidence_spans.len() * 2 + 1);
        let mut cursor = 0usize;

        for span in &self.confidence_spans {
            let start = boundaries.get(span.range.start).copied().flatten();
            let end = span
                .range
                .end()
                .and_then(|end| boundaries.get(end).copied().flatten());

            let (start, end) = match (start, end) {
                (Some(start), Some(end)) if start >= cursor && start <= end => (start, end),
                _ => {
                    warn!(
                        "Skipping confidence span at {} (length {}) outside text of {} code units",
                        span.range.start,
                        span.range.length,
                        boundaries.len().saturating_sub(1)
                    );
                    continue;
                }
            };

            push_run(&mut runs, &self.text[cursor..start], None);
            push_run(&mut runs, &self.text[start..end], Some(span.confidence));
            cursor = end;
        }

        push_run(&mut runs, &self.text[cursor..], None);
        runs
    }

    /// Mean segment confidence, if there are any segments
    pub fn mean_confidence(&self) -> Option<f32> {
        if self.confidence_spans.is_empty() {
            return None;
        }
        let sum: f32 = self.confidence_spans.iter().map(|s| s.confidence).sum();
        Some(sum / self.confidence_spans.len() as f32)
    }
}

fn push_run(runs: &mut Vec<TextRun>, text: &str, confidence: Option<f32>) {
    if text.is_empty() {
        return;
    }
    runs.push(TextRun {
        text: text.to_string(),
        confidence,
    });
}

/// Byte offset for each UTF-16 offset, `None` inside a surrogate pair
fn utf16_boundaries(text: &str) -> Vec<Option<usize>> {
    let mut map = Vec::with_capacity(text.len() + 1);
    for (byte, ch) in text.char_indices() {
        map.push(Some(byte));
        for _ in 1..ch.len_utf16() {
            map.push(None);
        }
    }
    map.push(Some(text.len()));
    map
}
