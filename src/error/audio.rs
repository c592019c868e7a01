// Audio decode error types and constants

use std::path::PathBuf;

use thiserror::Error;
use tracing::error;

use crate::error::ErrorCode;

/// Decode error code constants
///
/// Error code range: 3001-3004
pub struct DecodeErrorCodes {}

impl DecodeErrorCodes {
    /// File could not be opened or read
    pub const UNREADABLE: i32 = 3001;

    /// Container format not recognised by any demuxer
    pub const UNSUPPORTED: i32 = 3002;

    /// Stream decoded to nothing usable
    pub const CORRUPT: i32 = 3003;

    /// Sample-rate conversion failed
    pub const RESAMPLE_FAILED: i32 = 3004;
}

/// Log a decode error with structured context
pub fn log_decode_error(err: &DecodeError, context: &str) {
    error!(
        "Decode error in {}: code={}, component=AudioLoader, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Failure to turn one file into a mono waveform.
///
/// Always names the offending path; the orchestrator excludes the file
/// and keeps going.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("cannot read {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("unsupported audio format in {path}: {reason}")]
    Unsupported { path: PathBuf, reason: String },

    #[error("corrupt audio stream in {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("resampling {path} failed: {reason}")]
    ResampleFailed { path: PathBuf, reason: String },
}

impl DecodeError {
    /// Path of the file that failed to decode
    pub fn path(&self) -> &PathBuf {
        match self {
            DecodeError::Unreadable { path, .. }
            | DecodeError::Unsupported { path, .. }
            | DecodeError::Corrupt { path, .. }
            | DecodeError::ResampleFailed { path, .. } => path,
        }
    }
}

impl ErrorCode for DecodeError {
    fn code(&self) -> i32 {
        match self {
            DecodeError::Unreadable { .. } => DecodeErrorCodes::UNREADABLE,
            DecodeError::Unsupported { .. } => DecodeErrorCodes::UNSUPPORTED,
            DecodeError::Corrupt { .. } => DecodeErrorCodes::CORRUPT,
            DecodeError::ResampleFailed { .. } => DecodeErrorCodes::RESAMPLE_FAILED,
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }
}
