// Batch-level error types and constants

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::error::ErrorCode;

/// Pipeline error code constants
///
/// Error code range: 5001-5008
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    /// Unrecognised or out-of-range configuration
    pub const CONFIG_VALIDATION: i32 = 5001;

    /// Filename token count disagrees with the field mapping
    pub const SCHEMA_MISMATCH: i32 = 5002;

    /// No file survived extraction
    pub const EMPTY_BATCH: i32 = 5003;

    /// Input path missing or unreadable
    pub const INPUT: i32 = 5004;

    /// Filesystem error while writing output
    pub const IO: i32 = 5005;

    /// Delimited output could not be written
    pub const CSV: i32 = 5006;

    /// Worker pool could not be created
    pub const WORKER_POOL: i32 = 5007;

    /// Table rejected by the visualization hand-off
    pub const VISUALIZATION: i32 = 5008;
}

/// A filename whose token count disagrees with the field mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCountMismatch {
    pub path: PathBuf,
    pub found: usize,
}

/// Field-mapping arity disagreement for one or more files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMismatch {
    pub expected: usize,
    pub mismatches: Vec<TokenCountMismatch>,
}

impl SchemaMismatch {
    pub fn single(path: PathBuf, expected: usize, found: usize) -> Self {
        Self {
            expected,
            mismatches: vec![TokenCountMismatch { path, found }],
        }
    }
}

impl fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field mapping has {} entries but {} file(s) disagree:",
            self.expected,
            self.mismatches.len()
        )?;
        for mismatch in &self.mismatches {
            write!(
                f,
                " {} ({} tokens);",
                mismatch.path.display(),
                mismatch.found
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaMismatch {}

/// Errors that abort a whole extraction run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {reason}")]
    ConfigValidation { reason: String },

    #[error("filename schema mismatch: {0}")]
    SchemaMismatch(#[from] SchemaMismatch),

    #[error("no file survived extraction ({attempted} attempted)")]
    EmptyBatch { attempted: usize },

    #[error("input {path}: {reason}")]
    Input { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("table output failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("worker pool: {reason}")]
    WorkerPool { reason: String },

    #[error("visualization hand-off refused: {reason}")]
    Visualization { reason: String },
}

impl PipelineError {
    pub fn config(reason: impl Into<String>) -> Self {
        PipelineError::ConfigValidation {
            reason: reason.into(),
        }
    }
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::ConfigValidation { .. } => PipelineErrorCodes::CONFIG_VALIDATION,
            PipelineError::SchemaMismatch(_) => PipelineErrorCodes::SCHEMA_MISMATCH,
            PipelineError::EmptyBatch { .. } => PipelineErrorCodes::EMPTY_BATCH,
            PipelineError::Input { .. } => PipelineErrorCodes::INPUT,
            PipelineError::Io(_) => PipelineErrorCodes::IO,
            PipelineError::Csv(_) => PipelineErrorCodes::CSV,
            PipelineError::WorkerPool { .. } => PipelineErrorCodes::WORKER_POOL,
            PipelineError::Visualization { .. } => PipelineErrorCodes::VISUALIZATION,
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
    fn test_pipeline_error_codes() {
        assert_eq!(
            PipelineError::config("bad").code(),
            PipelineErrorCodes::CONFIG_VALIDATION
        );
        assert_eq!(
            PipelineError::EmptyBatch { attempted: 3 }.code(),
            PipelineErrorCodes::EMPTY_BATCH
        );
    }

    #[test]
    fn test_schema_mismatch_lists_every_file() {
        let err = SchemaMismatch {
            expected: 3,
            mismatches: vec![
                TokenCountMismatch {
                    path: PathBuf::from("a_b.wav"),
                    found: 2,
                },
                TokenCountMismatch {
                    path: PathBuf::from("a_b_c_d.wav"),
                    found: 4,
                },
            ],
        };
        let message = PipelineError::from(err).message();
        assert!(message.contains("a_b.wav (2 tokens)"));
        assert!(message.contains("a_b_c_d.wav (4 tokens)"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test error");
        let err: PipelineError = io_err.into();
        assert_eq!(err.code(), PipelineErrorCodes::IO);
        assert!(err.message().contains("test error"));
    }
}
