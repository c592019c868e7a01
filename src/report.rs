// Report module - end-of-run account of what happened to every input
//
// Collected by the orchestrator while the batch runs, logged once at the end
// and optionally written as JSON next to the table.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::FeatureFamily;
use crate::error::PipelineError;

/// Why a file produced no row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Decoding failed
    Decode { code: i32, message: String },
    /// Too short for every selected family
    ShortAudio { samples: usize },
    /// Filename did not fit the metadata schema
    Metadata { message: String },
    /// Never started because the run was cancelled
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exclusion {
    pub path: PathBuf,
    pub reason: ExclusionReason,
}

/// One family failing on one file (that family reported NA)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FamilyFailure {
    pub path: PathBuf,
    pub family: FeatureFamily,
    pub code: i32,
    pub message: String,
}

/// Summary of one extraction run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Audio files handed to the workers
    pub inputs: usize,
    /// Files skipped because they carry no audio signature
    pub skipped_non_audio: Vec<PathBuf>,
    pub excluded: Vec<Exclusion>,
    pub family_failures: Vec<FamilyFailure>,
    /// Rows removed by the table assembler for missing values
    pub dropped_na_rows: Vec<PathBuf>,
    pub rows: usize,
    pub columns: usize,
    /// Exactly one observation; a projection of it is meaningless
    pub single_observation: bool,
    pub cancelled: bool,
    /// Version string of the speaker model, when one was used
    pub embedder_version: Option<String>,
}

impl RunReport {
    pub fn excluded_count(&self) -> usize {
        self.excluded.len()
    }

    pub fn cancelled_count(&self) -> usize {
        self.excluded
            .iter()
            .filter(|e| e.reason == ExclusionReason::Cancelled)
            .count()
    }

    /// Emit the end-of-run summary
    pub fn log_summary(&self) {
        info!(
            "[Report] {} input(s): {} row(s) x {} column(s), {} excluded, {} dropped for NA, {} non-audio skipped",
            self.inputs,
            self.rows,
            self.columns,
            self.excluded.len(),
            self.dropped_na_rows.len(),
            self.skipped_non_audio.len()
        );
        for exclusion in &self.excluded {
            match &exclusion.reason {
                ExclusionReason::Decode { code, message } => {
                    warn!("[Report] Excluded {} (code={}): {}", exclusion.path.display(), code, message)
                }
                ExclusionReason::ShortAudio { samples } => warn!(
                    "[Report] Excluded {}: too short for every family ({} samples)",
                    exclusion.path.display(),
                    samples
                ),
                ExclusionReason::Metadata { message } => {
                    warn!("[Report] Excluded {}: {}", exclusion.path.display(), message)
                }
                ExclusionReason::Cancelled => {}
            }
        }
        if self.cancelled {
            warn!("[Report] Run cancelled; {} file(s) not processed", self.cancelled_count());
        }
        for failure in &self.family_failures {
            warn!(
                "[Report] {} on {} reported NA (code={}): {}",
                failure.family,
                failure.path.display(),
                failure.code,
                failure.message
            );
        }
        if !self.dropped_na_rows.is_empty() {
            warn!(
                "[Report] {} row(s) dropped because they contain NA values, which the projector cannot embed",
                self.dropped_na_rows.len()
            );
        }
        if self.single_observation {
            warn!("[Report] Only one observation; it cannot be meaningfully projected");
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, PipelineError> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::Io(e.into()))
    }

    pub fn write_json(&self, path: &Path) -> Result<(), PipelineError> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }
}
