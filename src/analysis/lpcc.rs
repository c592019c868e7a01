// LPCC module - linear-prediction cepstral coefficients
//
// Per frame: pre-emphasis, Hamming window, autocorrelation LPC of the
// configured order, then the LPC -> cepstrum recursion. Silent frames (no
// stable predictor) are skipped, so they do not bias the statistics. A
// signal with no modelled frame at all fails the family.

use serde::{Deserialize, Serialize};

use super::frames::{hamming, pre_emphasis, Framing};
use super::lpc::{lpc, lpc_to_cepstrum};
use super::stats::{stat_columns, summarise, Statistic};
use super::{check_framing, check_statistics, FeatureExtractor, FeatureFamily, FeatureVector};
use crate::error::FeatureError;

/// Parameters of the LPCC family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LpccParams {
    pub lpc_order: usize,
    /// Number of cepstra (c_1..c_n); defaults to the LPC order
    pub num_cepstra: Option<usize>,
    pub window_length_ms: f32,
    pub hop_length_ms: f32,
    pub pre_emphasis: f32,
    /// Prepend c_0 = ln(G²) as `lpcc_00`
    pub include_gain: bool,
    pub statistics: Vec<Statistic>,
}

impl Default for LpccParams {
    fn default() -> Self {
        Self {
            lpc_order: 12,
            num_cepstra: None,
            window_length_ms: 25.0,
            hop_length_ms: 10.0,
            pre_emphasis: 0.97,
            include_gain: false,
            statistics: vec![Statistic::Mean],
        }
    }
}

impl LpccParams {
    pub fn validate(&self, sample_rate: u32) -> Result<(), String> {
        check_framing(self.window_length_ms, self.hop_length_ms)?;
        if !(2..=64).contains(&self.lpc_order) {
            return Err(format!("lpc_order must be in 2..=64 (got {})", self.lpc_order));
        }
        if self.num_cepstra == Some(0) {
            return Err("num_cepstra must be >= 1".to_string());
        }
        let window = Framing::from_ms(self.window_length_ms, self.hop_length_ms, sample_rate).window;
        if window <= self.lpc_order {
            return Err(format!(
                "analysis window ({window} samples) must be longer than lpc_order ({})",
                self.lpc_order
            ));
        }
        if !(0.0..1.0).contains(&self.pre_emphasis) {
            return Err(format!(
                "pre_emphasis must be in [0, 1) (got {})",
                self.pre_emphasis
            ));
        }
        check_statistics(&self.statistics)
    }

    fn cepstra_count(&self) -> usize {
        self.num_cepstra.unwrap_or(self.lpc_order)
    }
}

/// LPCC extractor bound to one parameter set
pub struct LpccExtractor {
    params: LpccParams,
}

impl LpccExtractor {
    pub fn new(params: LpccParams) -> Self {
        Self { params }
    }

    fn indices(&self) -> std::ops::RangeInclusive<usize> {
        let first = if self.params.include_gain { 0 } else { 1 };
        first..=self.params.cepstra_count()
    }
}

impl FeatureExtractor for LpccExtractor {
    fn family(&self) -> FeatureFamily {
        FeatureFamily::Lpcc
    }

    fn columns(&self) -> Vec<String> {
        self.indices()
            .flat_map(|k| stat_columns(&format!("lpcc_{k:02}"), &self.params.statistics))
            .collect()
    }

    fn extract(&self, waveform: &[f32], sample_rate: u32) -> Result<FeatureVector, FeatureError> {
        let p = &self.params;
        let framing = Framing::from_ms(p.window_length_ms, p.hop_length_ms, sample_rate);
        framing.require(waveform)?;

        let emphasized = pre_emphasis(waveform, p.pre_emphasis);
        let window = hamming(framing.window);
        let count = p.cepstra_count();
        // index 0 holds the gain term
        let mut series: Vec<Vec<f64>> = vec![Vec::new(); count + 1];

        for frame in framing.frames(&emphasized) {
            let windowed: Vec<f64> = frame
                .iter()
                .zip(&window)
                .map(|(s, w)| (*s as f64) * (*w as f64))
                .collect();
            let Some(model) = lpc(&windowed, p.lpc_order) else {
                continue;
            };
            series[0].push(model.error.ln());
            for (k, c) in lpc_to_cepstrum(&model.coeffs, count).into_iter().enumerate() {
                series[k + 1].push(c);
            }
        }
        if series[0].is_empty() {
            return Err(FeatureError::Computation {
                family: self.family().name().to_string(),
                reason: "no frame had enough energy for a stable LPC model".to_string(),
            });
        }

        let mut vector = FeatureVector::with_capacity(self.columns().len());
        for k in self.indices() {
            vector.push_stats(
                &format!("lpcc_{k:02}"),
                &p.statistics,
                summarise(&series[k], &p.statistics),
            );
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_sine_wave(sample_rate: u32, frequency: f32, duration_samples: usize) -> Vec<f32> {
        (0..duration_samples)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                0.5 * (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_columns_default_and_with_gain() {
        let extractor = LpccExtractor::new(LpccParams::default());
        let columns = extractor.columns();
        assert_eq!(columns.len(), 12);
        assert_eq!(columns[0], "lpcc_01_mean");
        assert_eq!(columns[11], "lpcc_12_mean");

        let extractor = LpccExtractor::new(LpccParams {
            include_gain: true,
            num_cepstra: Some(16),
            statistics: vec![Statistic::Mean, Statistic::Std],
            ..LpccParams::default()
        });
        let columns = extractor.columns();
        assert_eq!(columns.len(), 34);
        assert_eq!(columns[0], "lpcc_00_mean");
        assert_eq!(columns[1], "lpcc_00_std");
    }

    #[test]
    fn test_extract_tonal_signal() {
        let extractor = LpccExtractor::new(LpccParams::default());
        let mut signal = generate_sine_wave(16_000, 300.0, 16_000);
        // a little broadband content keeps the predictor well conditioned
        for (i, s) in signal.iter_mut().enumerate() {
            *s += 0.01 * ((i * 7919 % 200) as f32 / 100.0 - 1.0);
        }
        let vector = extractor.extract(&signal, 16_000).unwrap();
        assert_eq!(vector.columns(), extractor.columns());
        assert!(!vector.has_missing());
    }

    #[test]
    fn test_silence_is_computation_error() {
        let extractor = LpccExtractor::new(LpccParams::default());
        let err = extractor.extract(&vec![0.0; 8_000], 16_000).unwrap_err();
        match err {
            FeatureError::Computation { family, reason } => {
                assert_eq!(family, "lpcc");
                assert!(reason.contains("LPC model"));
            }
            other => panic!("expected computation error, got {other}"),
        }
        assert_eq!(extractor.family(), FeatureFamily::Lpcc);
    }

    #[test]
    fn test_short_audio_rejected() {
        let extractor = LpccExtractor::new(LpccParams::default());
        let err = extractor.extract(&[0.1; 100], 16_000).unwrap_err();
        assert!(matches!(err, FeatureError::ShortAudio { required: 400, available: 100 }));
    }

    #[test]
    fn test_validate_rejects_bad_order() {
        let params = LpccParams {
            lpc_order: 1,
            ..LpccParams::default()
        };
        assert!(params.validate(16_000).is_err());
        assert!(LpccParams::default().validate(16_000).is_ok());
    }
}
