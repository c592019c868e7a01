// Analysis module - feature families and their shared plumbing
//
// Each family turns one mono waveform into a fixed-schema FeatureVector:
// - mel: MFCC (+ deltas)
// - prosody: pitch, formants, VTL, HNR, jitter/shimmer, RMS
// - spectral: centroid, bandwidth, contrast, flatness, roll-off, ZCR, entropy
// - lpcc: linear-prediction cepstra
// - speaker: embeddings from an external model
//
// A FeatureSpec (family + typed params) is parsed from JSON, validated
// against the target sample rate and built into a boxed extractor.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

pub mod embedding;
pub mod fft;
pub mod frames;
pub mod lpc;
pub mod lpcc;
pub mod mel;
pub mod prosody;
pub mod spectral;
pub mod stats;
pub mod temporal;

use embedding::{SpeakerEmbedder, SpeakerExtractor, SpeakerParams};
use lpcc::{LpccExtractor, LpccParams};
use mel::{MelExtractor, MelParams};
use prosody::{ProsodyExtractor, ProsodyParams};
use spectral::{SpectralExtractor, SpectralParams};
use stats::{stat_columns, Statistic};

use crate::error::FeatureError;

/// Feature family identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureFamily {
    Mel,
    Prosody,
    Spectral,
    Lpcc,
    Speaker,
}

impl FeatureFamily {
    pub const ALL: [FeatureFamily; 5] = [
        FeatureFamily::Mel,
        FeatureFamily::Prosody,
        FeatureFamily::Spectral,
        FeatureFamily::Lpcc,
        FeatureFamily::Speaker,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FeatureFamily::Mel => "mel",
            FeatureFamily::Prosody => "prosody",
            FeatureFamily::Spectral => "spectral",
            FeatureFamily::Lpcc => "lpcc",
            FeatureFamily::Speaker => "speaker",
        }
    }
}

impl fmt::Display for FeatureFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureFamily::ALL
            .into_iter()
            .find(|family| family.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = FeatureFamily::ALL.iter().map(|f| f.name()).collect();
                format!("unknown feature family '{s}' (expected one of {})", known.join(", "))
            })
    }
}

/// One feature family bound to its parameters
///
/// Pure and deterministic: the same waveform always yields the same vector,
/// and `extract` output columns always equal `columns()`.
pub trait FeatureExtractor: Send + Sync {
    fn family(&self) -> FeatureFamily;

    /// Output column names, fully determined by the parameters
    fn columns(&self) -> Vec<String>;

    fn extract(&self, waveform: &[f32], sample_rate: u32) -> Result<FeatureVector, FeatureError>;
}

/// Ordered `(column, value)` pairs; `None` marks a missing value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(String, Option<f64>)>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// All-missing vector for the given columns
    pub fn missing(columns: &[String]) -> Self {
        Self {
            entries: columns.iter().map(|c| (c.clone(), None)).collect(),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite());
        self.entries.push((column.into(), value));
    }

    /// Push `<base>_<stat>` for each statistic with its summarised value
    pub fn push_stats(&mut self, base: &str, stats: &[Statistic], values: Vec<Option<f64>>) {
        for (column, value) in stat_columns(base, stats).into_iter().zip(values) {
            self.push(column, value);
        }
    }

    pub fn columns(&self) -> Vec<String> {
        self.entries.iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }

    /// `None` if the column is absent, `Some(None)` if it is missing
    pub fn get(&self, column: &str) -> Option<Option<f64>> {
        self.entries
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_missing(&self) -> bool {
        self.entries.iter().any(|(_, v)| v.is_none())
    }

    pub fn missing_count(&self) -> usize {
        self.entries.iter().filter(|(_, v)| v.is_none()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<f64>)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), *v))
    }

}

/// Shared window/hop validation
pub(crate) fn check_framing(window_ms: f32, hop_ms: f32) -> Result<(), String> {
    if !(window_ms > 0.0 && window_ms.is_finite()) {
        return Err(format!("window_length_ms must be > 0 (got {window_ms})"));
    }
    if !(hop_ms > 0.0 && hop_ms <= window_ms) {
        return Err(format!(
            "hop_length_ms must be in (0, window_length_ms] (got {hop_ms})"
        ));
    }
    Ok(())
}

/// Statistics lists must be non-empty and free of duplicates
pub(crate) fn check_statistics(stats: &[Statistic]) -> Result<(), String> {
    if stats.is_empty() {
        return Err("statistics must not be empty".to_string());
    }
    for (i, stat) in stats.iter().enumerate() {
        if stats[..i].contains(stat) {
            return Err(format!("duplicate statistic '{stat}'"));
        }
    }
    Ok(())
}

/// Feature family with its typed parameter set
///
/// JSON form: `{ "family": "mel", "params": { ... } }`; `params` may be
/// omitted to take every default. Unknown families and unknown parameter
/// keys are rejected while parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "family", content = "params", rename_all = "lowercase")]
pub enum FeatureSpec {
    Mel(MelParams),
    Prosody(ProsodyParams),
    Spectral(SpectralParams),
    Lpcc(LpccParams),
    Speaker(SpeakerParams),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFeatureSpec {
    family: String,
    #[serde(default)]
    params: serde_json::Value,
}

impl TryFrom<RawFeatureSpec> for FeatureSpec {
    type Error = String;

    fn try_from(raw: RawFeatureSpec) -> Result<Self, Self::Error> {
        let family: FeatureFamily = raw.family.parse()?;
        let params = if raw.params.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            raw.params
        };
        let invalid = |e: serde_json::Error| format!("invalid params for family '{family}': {e}");
        Ok(match family {
            FeatureFamily::Mel => FeatureSpec::Mel(serde_json::from_value(params).map_err(invalid)?),
            FeatureFamily::Prosody => {
                FeatureSpec::Prosody(serde_json::from_value(params).map_err(invalid)?)
            }
            FeatureFamily::Spectral => {
                FeatureSpec::Spectral(serde_json::from_value(params).map_err(invalid)?)
            }
            FeatureFamily::Lpcc => FeatureSpec::Lpcc(serde_json::from_value(params).map_err(invalid)?),
            FeatureFamily::Speaker => {
                FeatureSpec::Speaker(serde_json::from_value(params).map_err(invalid)?)
            }
        })
    }
}

impl<'de> Deserialize<'de> for FeatureSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawFeatureSpec::deserialize(deserializer)?;
        FeatureSpec::try_from(raw).map_err(serde::de::Error::custom)
    }
}

impl FeatureSpec {
    /// Spec with every parameter at its default
    pub fn default_for(family: FeatureFamily) -> Self {
        match family {
            FeatureFamily::Mel => FeatureSpec::Mel(MelParams::default()),
            FeatureFamily::Prosody => FeatureSpec::Prosody(ProsodyParams::default()),
            FeatureFamily::Spectral => FeatureSpec::Spectral(SpectralParams::default()),
            FeatureFamily::Lpcc => FeatureSpec::Lpcc(LpccParams::default()),
            FeatureFamily::Speaker => FeatureSpec::Speaker(SpeakerParams::default()),
        }
    }

    pub fn family(&self) -> FeatureFamily {
        match self {
            FeatureSpec::Mel(_) => FeatureFamily::Mel,
            FeatureSpec::Prosody(_) => FeatureFamily::Prosody,
            FeatureSpec::Spectral(_) => FeatureFamily::Spectral,
            FeatureSpec::Lpcc(_) => FeatureFamily::Lpcc,
            FeatureSpec::Speaker(_) => FeatureFamily::Speaker,
        }
    }

    /// Check parameter ranges against the pipeline's sample rate
    pub fn validate(&self, sample_rate: u32) -> Result<(), String> {
        let result = match self {
            FeatureSpec::Mel(p) => p.validate(sample_rate),
            FeatureSpec::Prosody(p) => p.validate(sample_rate),
            FeatureSpec::Spectral(p) => p.validate(sample_rate),
            FeatureSpec::Lpcc(p) => p.validate(sample_rate),
            FeatureSpec::Speaker(p) => p.validate(),
        };
        result.map_err(|reason| format!("{}: {reason}", self.family()))
    }

    /// Bind the parameters into an extractor
    ///
    /// The speaker family needs an embedder; every other family ignores it.
    pub fn build(
        &self,
        embedder: Option<&Arc<dyn SpeakerEmbedder>>,
    ) -> Result<Box<dyn FeatureExtractor>, String> {
        Ok(match self {
            FeatureSpec::Mel(p) => Box::new(MelExtractor::new(p.clone())),
            FeatureSpec::Prosody(p) => Box::new(ProsodyExtractor::new(p.clone())),
            FeatureSpec::Spectral(p) => Box::new(SpectralExtractor::new(p.clone())),
            FeatureSpec::Lpcc(p) => Box::new(LpccExtractor::new(p.clone())),
            FeatureSpec::Speaker(p) => {
                let embedder = embedder.ok_or_else(|| {
                    "speaker family selected but no speaker embedder was provided".to_string()
                })?;
                Box::new(SpeakerExtractor::new(p.clone(), Arc::clone(embedder)))
            }
        })
    }
}
