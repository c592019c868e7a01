// Error types for the acoustic atlas pipeline
//
// Errors are split by how far they propagate:
// - DecodeError: one file cannot be read; the file is excluded
// - FeatureError: one feature family fails on one file; that family reports NA
// - PipelineError: configuration or whole-batch failures; returned to the caller

mod audio;
mod feature;
mod pipeline;

pub use audio::{log_decode_error, DecodeError, DecodeErrorCodes};
pub use feature::{FeatureError, FeatureErrorCodes};
pub use pipeline::{PipelineError, PipelineErrorCodes, SchemaMismatch, TokenCountMismatch};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, so reports and the CLI exit path can classify
/// failures without matching on variants.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
