use thiserror::Error;

/// Reasons a recognition session can fail. All are terminal for the
/// current attempt; the caller has to start a new session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognizerError {
    #[error("Can't initialize speech recognizer")]
    NoRecognizer,

    #[error("Not authorized to recognize speech")]
    NotAuthorized,

    #[error("Not permitted to record audio")]
    NotPermitted,

    #[error("Recognizer is unavailable")]
    RecognizerUnavailable,

    #[error("{0}")]
    Underlying(String),
}

impl RecognizerError {
    /// Wrap a collaborator failure, keeping its full context chain
    pub fn underlying(err: &anyhow::Error) -> Self {
        RecognizerError::Underlying(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn messages_are_stable() {
        assert_eq!(
            RecognizerError::NoRecognizer.to_string(),
            "Can't initialize speech recognizer"
        );
        assert_eq!(
            RecognizerError::NotAuthorized.to_string(),
            "Not authorized to recognize speech"
        );
        assert_eq!(
            RecognizerError::NotPermitted.to_string(),
            "Not permitted to record audio"
        );
        assert_eq!(
            RecognizerError::RecognizerUnavailable.to_string(),
            "Recognizer is unavailable"
        );
        assert_eq!(
            RecognizerError::Underlying("audio route lost".into()).to_string(),
            "audio route lost"
        );
    }

    #[test]
    fn underlying_keeps_context_chain() {
        let err: anyhow::Result<()> = Err(anyhow::anyhow!("device busy"));
        let err = err.context("Failed to start audio capture").unwrap_err();

        assert_eq!(
            RecognizerError::underlying(&err).to_string(),
            "Failed to start audio capture: device busy"
        );
    }
}
