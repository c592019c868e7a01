// Feature extraction error types and constants

use thiserror::Error;

use crate::error::ErrorCode;

/// Feature error code constants
///
/// Error code range: 4001-4003
pub struct FeatureErrorCodes {}

impl FeatureErrorCodes {
    /// Waveform shorter than one analysis window
    pub const SHORT_AUDIO: i32 = 4001;

    /// Numerical failure inside an extractor
    pub const COMPUTATION: i32 = 4002;

    /// External speaker-embedding model failed
    pub const EMBEDDING: i32 = 4003;
}

/// Failure of one feature family on one waveform.
///
/// Recovered locally: the family reports NA for that file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("audio too short: need {required} samples for one analysis window, got {available}")]
    ShortAudio { required: usize, available: usize },

    #[error("{family} computation failed: {reason}")]
    Computation { family: String, reason: String },

    #[error("speaker embedding failed: {reason}")]
    Embedding { reason: String },
}

impl ErrorCode for FeatureError {
    fn code(&self) -> i32 {
        match self {
            FeatureError::ShortAudio { .. } => FeatureErrorCodes::SHORT_AUDIO,
            FeatureError::Computation { .. } => FeatureErrorCodes::COMPUTATION,
            FeatureError::Embedding { .. } => FeatureErrorCodes::EMBEDDING,
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_audio_message() {
        let err = FeatureError::ShortAudio {
            required: 400,
            available: 120,
        };
        assert_eq!(err.code(), FeatureErrorCodes::SHORT_AUDIO);
        assert!(err.message().contains("400"));
        assert!(err.message().contains("120"));
    }
}
