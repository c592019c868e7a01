// Embedding module - speaker embeddings from an external model
//
// The model itself is opaque: anything implementing `SpeakerEmbedder`.
// This module owns what happens around the call: resampling to the model's
// rate, peak normalisation, minimum-duration padding or rejection, output
// length checking and column naming.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::frames::ms_to_samples;
use super::{FeatureExtractor, FeatureFamily, FeatureVector};
use crate::audio::resample_mono;
use crate::error::FeatureError;

/// Extracts fixed-length speaker embeddings from mono audio.
///
/// Input is mono `f32` at [`SpeakerEmbedder::sample_rate`], peak-normalised
/// and at least `min_duration_ms` long (padded or rejected beforehand).
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent use; files are embedded
/// from several worker threads at once.
pub trait SpeakerEmbedder: Send + Sync {
    /// Computes one embedding for the whole waveform.
    ///
    /// `sample_rate` is the rate of `waveform`; implementations should
    /// reject anything other than [`SpeakerEmbedder::sample_rate`].
    fn embed(&self, waveform: &[f32], sample_rate: u32) -> Result<Vec<f32>, String>;

    /// Returns the dimensionality of the embedding vectors (e.g., 192).
    fn dimension(&self) -> usize;

    /// Sample rate the model expects.
    fn sample_rate(&self) -> u32;

    /// Identifier of the model build, recorded in run reports.
    fn model_version(&self) -> String;
}

/// Parameters of the speaker family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeakerParams {
    pub min_duration_ms: f32,
    /// Zero-pad short recordings up to `min_duration_ms` instead of rejecting them
    pub pad_short: bool,
    /// Scale the waveform so its absolute peak is 1.0
    pub peak_normalize: bool,
}

impl Default for SpeakerParams {
    fn default() -> Self {
        Self {
            min_duration_ms: 400.0,
            pad_short: true,
            peak_normalize: true,
        }
    }
}

impl SpeakerParams {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.min_duration_ms > 0.0 && self.min_duration_ms.is_finite()) {
            return Err(format!(
                "min_duration_ms must be > 0 (got {})",
                self.min_duration_ms
            ));
        }
        Ok(())
    }
}

/// Speaker-embedding extractor wrapping one model
pub struct SpeakerExtractor {
    params: SpeakerParams,
    embedder: Arc<dyn SpeakerEmbedder>,
}

impl SpeakerExtractor {
    pub fn new(params: SpeakerParams, embedder: Arc<dyn SpeakerEmbedder>) -> Self {
        Self { params, embedder }
    }

    pub fn model_version(&self) -> String {
        self.embedder.model_version()
    }

    /// Bring a waveform into the form the model expects
    fn prepare(&self, waveform: &[f32], sample_rate: u32) -> Result<Vec<f32>, FeatureError> {
        let model_rate = self.embedder.sample_rate();
        let mut samples = resample_mono(waveform, sample_rate, model_rate).map_err(|reason| {
            FeatureError::Embedding {
                reason: format!("resampling to {model_rate} Hz failed: {reason}"),
            }
        })?;

        let required = ms_to_samples(self.params.min_duration_ms, model_rate);
        if samples.len() < required {
            if !self.params.pad_short {
                return Err(FeatureError::ShortAudio {
                    required,
                    available: samples.len(),
                });
            }
            samples.resize(required, 0.0);
        }

        if self.params.peak_normalize {
            let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            if peak > 0.0 {
                samples.iter_mut().for_each(|s| *s /= peak);
            }
        }
        Ok(samples)
    }
}

impl FeatureExtractor for SpeakerExtractor {
    fn family(&self) -> FeatureFamily {
        FeatureFamily::Speaker
    }

    fn columns(&self) -> Vec<String> {
        (1..=self.embedder.dimension())
            .map(|i| format!("spk_{i:03}"))
            .collect()
    }

    fn extract(&self, waveform: &[f32], sample_rate: u32) -> Result<FeatureVector, FeatureError> {
        let prepared = self.prepare(waveform, sample_rate)?;
        let embedding = self
            .embedder
            .embed(&prepared, self.embedder.sample_rate())
            .map_err(|reason| FeatureError::Embedding { reason })?;

        let dimension = self.embedder.dimension();
        if embedding.len() != dimension {
            return Err(FeatureError::Embedding {
                reason: format!(
                    "model returned {} values, expected {dimension}",
                    embedding.len()
                ),
            });
        }

        let mut vector = FeatureVector::with_capacity(dimension);
        for (name, value) in self.columns().into_iter().zip(embedding) {
            let value = value as f64;
            vector.push(name, value.is_finite().then_some(value));
        }
        Ok(vector)
    }
}
