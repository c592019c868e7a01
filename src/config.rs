//! Configuration for extraction runs
//!
//! A run is described by one JSON document: target sample rate, worker
//! count, the ordered list of feature families with their parameters, the
//! filename metadata schema and output options. Every key has a default,
//! unknown keys are rejected, and the whole configuration is validated
//! before any file is touched.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::embedding::SpeakerEmbedder;
use crate::analysis::{FeatureExtractor, FeatureFamily, FeatureSpec};
use crate::error::PipelineError;
use crate::metadata::MetadataSchema;
use crate::table::RESERVED_COLUMNS;

/// Output options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Append the constant `selection` column expected by the projector UI
    pub append_selection: bool,
    /// Field delimiter of the written table (single ASCII character)
    pub delimiter: char,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            append_selection: true,
            delimiter: ',',
        }
    }
}

impl OutputConfig {
    pub fn delimiter_byte(&self) -> Result<u8, PipelineError> {
        if !self.delimiter.is_ascii() || matches!(self.delimiter, '"' | '\n' | '\r') {
            return Err(PipelineError::config(format!(
                "delimiter must be a single ASCII character other than quote or newline (got {:?})",
                self.delimiter
            )));
        }
        Ok(self.delimiter as u8)
    }
}

/// Complete extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Every waveform is resampled to this rate before analysis
    pub target_sample_rate: u32,
    /// Worker threads; `None` uses the available parallelism
    pub workers: Option<usize>,
    /// Selected feature families, in column order
    pub features: Vec<FeatureSpec>,
    pub metadata: MetadataSchema,
    pub output: OutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            workers: None,
            features: vec![FeatureSpec::default_for(FeatureFamily::Mel)],
            metadata: MetadataSchema::default(),
            output: OutputConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file
    ///
    /// # Returns
    /// * `Ok(PipelineConfig)` - Parsed configuration (not yet validated)
    /// * `Err(PipelineError)` - Unreadable file or invalid JSON; unknown keys,
    ///   unknown families and malformed parameters are all rejected here
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| PipelineError::Input {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = Self::from_json(&contents)?;
        info!("[Config] Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(json).map_err(|e| PipelineError::config(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, PipelineError> {
        serde_json::to_string_pretty(self).map_err(|e| PipelineError::config(e.to_string()))
    }

    /// Worker count after resolving the default
    pub fn resolved_workers(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2)
        })
    }

    /// Validate the configuration and bind every feature family
    ///
    /// Checks the sample rate, worker count, family list (non-empty, no
    /// duplicates), each family's parameters, the metadata schema, the
    /// delimiter and that no metadata field collides with a reserved or
    /// feature column.
    pub fn build_extractors(
        &self,
        embedder: Option<&Arc<dyn SpeakerEmbedder>>,
    ) -> Result<Vec<Box<dyn FeatureExtractor>>, PipelineError> {
        if !(4_000..=192_000).contains(&self.target_sample_rate) {
            return Err(PipelineError::config(format!(
                "target_sample_rate must be in 4000..=192000 Hz (got {})",
                self.target_sample_rate
            )));
        }
        if self.workers == Some(0) {
            return Err(PipelineError::config("workers must be >= 1"));
        }
        if self.features.is_empty() {
            return Err(PipelineError::config("at least one feature family must be selected"));
        }
        for (i, spec) in self.features.iter().enumerate() {
            if self.features[..i].iter().any(|s| s.family() == spec.family()) {
                return Err(PipelineError::config(format!(
                    "feature family '{}' is selected twice",
                    spec.family()
                )));
            }
        }
        self.output.delimiter_byte()?;
        self.metadata.validate().map_err(PipelineError::config)?;

        let mut extractors = Vec::with_capacity(self.features.len());
        for spec in &self.features {
            spec.validate(self.target_sample_rate)
                .map_err(PipelineError::config)?;
            extractors.push(spec.build(embedder).map_err(PipelineError::config)?);
        }

        let feature_columns: Vec<String> = extractors.iter().flat_map(|e| e.columns()).collect();
        for field in self.metadata.columns() {
            if RESERVED_COLUMNS.contains(&field.as_str()) || feature_columns.contains(&field) {
                return Err(PipelineError::config(format!(
                    "metadata field '{field}' collides with an output column"
                )));
            }
        }
        Ok(extractors)
    }
}
