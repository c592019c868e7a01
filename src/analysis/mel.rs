// Mel module - MFCC extraction with optional delta / delta-delta blocks
//
// Pipeline per frame:
// 1. Pre-emphasis over the whole waveform
// 2. Hamming window, FFT size = window length
// 3. Power spectrum -> triangular mel filterbank (HTK mel scale)
// 4. 10 * log10(max(energy, 1e-10))
// 5. Orthonormal DCT-II -> first `num_mfcc` coefficients
// 6. Sinusoidal liftering (disabled when lifter = 0)
//
// Delta coefficients use the regression formula over +/-N frames with edge
// replication; delta-delta is the delta of the delta trajectory. Each block
// is summarised independently and gets its own column prefix.

use serde::{Deserialize, Serialize};

use super::fft::FftProcessor;
use super::frames::{hamming, pre_emphasis, Framing};
use super::stats::{stat_columns, summarise, Statistic};
use super::{check_framing, check_statistics, FeatureExtractor, FeatureFamily, FeatureVector};
use crate::error::FeatureError;

/// Parameters of the Mel/MFCC family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MelParams {
    /// Number of cepstral coefficients kept after the DCT
    pub num_mfcc: usize,
    /// Number of triangular mel bands
    pub num_mels: usize,
    pub window_length_ms: f32,
    pub hop_length_ms: f32,
    /// Lowest filterbank edge in Hz
    pub fmin_hz: f32,
    /// Highest filterbank edge in Hz (<= Nyquist)
    pub fmax_hz: f32,
    pub pre_emphasis: f32,
    /// Cepstral lifter length, 0 disables liftering
    pub lifter: usize,
    pub use_delta: bool,
    /// Requires `use_delta`
    pub use_delta_delta: bool,
    /// Regression window in frames (odd, >= 3)
    pub delta_width: usize,
    pub statistics: Vec<Statistic>,
}

impl Default for MelParams {
    fn default() -> Self {
        Self {
            num_mfcc: 13,
            num_mels: 40,
            window_length_ms: 25.0,
            hop_length_ms: 10.0,
            fmin_hz: 150.0,
            fmax_hz: 4000.0,
            pre_emphasis: 0.95,
            lifter: 22,
            use_delta: false,
            use_delta_delta: false,
            delta_width: 9,
            statistics: vec![Statistic::Mean],
        }
    }
}

impl MelParams {
    pub fn validate(&self, sample_rate: u32) -> Result<(), String> {
        if self.num_mels == 0 || self.num_mels > 256 {
            return Err(format!("num_mels must be in 1..=256 (got {})", self.num_mels));
        }
        if self.num_mfcc == 0 || self.num_mfcc > self.num_mels {
            return Err(format!(
                "num_mfcc must be in 1..=num_mels ({}) (got {})",
                self.num_mels, self.num_mfcc
            ));
        }
        check_framing(self.window_length_ms, self.hop_length_ms)?;
        let nyquist = sample_rate as f32 / 2.0;
        if !(self.fmin_hz >= 0.0 && self.fmin_hz < self.fmax_hz && self.fmax_hz <= nyquist) {
            return Err(format!(
                "need 0 <= fmin_hz < fmax_hz <= {nyquist} (got {} / {})",
                self.fmin_hz, self.fmax_hz
            ));
        }
        if !(0.0..1.0).contains(&self.pre_emphasis) {
            return Err(format!(
                "pre_emphasis must be in [0, 1) (got {})",
                self.pre_emphasis
            ));
        }
        if self.use_delta_delta && !self.use_delta {
            return Err("use_delta_delta requires use_delta".to_string());
        }
        if self.delta_width < 3 || self.delta_width % 2 == 0 {
            return Err(format!(
                "delta_width must be odd and >= 3 (got {})",
                self.delta_width
            ));
        }
        check_statistics(&self.statistics)
    }
}

/// Converts frequency in Hz to the HTK mel scale.
fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Converts HTK mel back to Hz.
fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank, `[num_mels][fft_size / 2 + 1]`
///
/// Weights are evaluated at each bin's centre frequency, so narrow bands
/// never collapse onto a neighbour's bin.
pub fn mel_filter_bank(
    num_mels: usize,
    fft_size: usize,
    sample_rate: u32,
    low_hz: f32,
    high_hz: f32,
) -> Vec<Vec<f32>> {
    let bins = fft_size / 2 + 1;
    let low_mel = hz_to_mel(low_hz);
    let high_mel = hz_to_mel(high_hz);
    let step = (high_mel - low_mel) / (num_mels + 1) as f32;
    let edges: Vec<f32> = (0..num_mels + 2)
        .map(|i| mel_to_hz(low_mel + i as f32 * step))
        .collect();
    let bin_hz = sample_rate as f32 / fft_size as f32;

    (0..num_mels)
        .map(|m| {
            let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
            (0..bins)
                .map(|k| {
                    let f = k as f32 * bin_hz;
                    let rising = (f - left) / (center - left);
                    let falling = (right - f) / (right - center);
                    rising.min(falling).max(0.0)
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II basis, `[num_coeffs][num_inputs]`
fn dct_basis(num_coeffs: usize, num_inputs: usize) -> Vec<Vec<f64>> {
    let n = num_inputs as f64;
    (0..num_coeffs)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..num_inputs)
                .map(|m| {
                    scale * (std::f64::consts::PI * k as f64 * (m as f64 + 0.5) / n).cos()
                })
                .collect()
        })
        .collect()
}

/// Regression delta of each coefficient trajectory
///
/// `frames` is `[n_frames][n_coeffs]`; the output has the same shape.
pub fn delta(frames: &[Vec<f64>], width: usize) -> Vec<Vec<f64>> {
    let n_frames = frames.len();
    if n_frames == 0 {
        return Vec::new();
    }
    let n_coeffs = frames[0].len();
    let half = (width.max(3) - 1) / 2;
    let denom: f64 = 2.0 * (1..=half).map(|n| (n * n) as f64).sum::<f64>();

    (0..n_frames)
        .map(|t| {
            (0..n_coeffs)
                .map(|c| {
                    (1..=half)
                        .map(|n| {
                            let ahead = frames[(t + n).min(n_frames - 1)][c];
                            let behind = frames[t.saturating_sub(n)][c];
                            n as f64 * (ahead - behind)
                        })
                        .sum::<f64>()
                        / denom
                })
                .collect()
        })
        .collect()
}

/// MFCC extractor bound to one parameter set
pub struct MelExtractor {
    params: MelParams,
}

impl MelExtractor {
    pub fn new(params: MelParams) -> Self {
        Self { params }
    }

    fn blocks(&self) -> Vec<&'static str> {
        let mut blocks = vec!["mfcc"];
        if self.params.use_delta {
            blocks.push("mfcc_delta");
        }
        if self.params.use_delta_delta {
            blocks.push("mfcc_delta2");
        }
        blocks
    }

    /// Per-frame cepstra, `[n_frames][num_mfcc]`
    fn cepstra(&self, waveform: &[f32], sample_rate: u32) -> Result<Vec<Vec<f64>>, FeatureError> {
        let p = &self.params;
        let framing = Framing::from_ms(p.window_length_ms, p.hop_length_ms, sample_rate);
        framing.require(waveform)?;

        let emphasized = pre_emphasis(waveform, p.pre_emphasis);
        let fft = FftProcessor::new(framing.window, hamming(framing.window));
        let bank = mel_filter_bank(p.num_mels, fft.fft_size(), sample_rate, p.fmin_hz, p.fmax_hz);
        let dct = dct_basis(p.num_mfcc, p.num_mels);
        let lifter: Vec<f64> = (0..p.num_mfcc)
            .map(|k| {
                if p.lifter == 0 {
                    1.0
                } else {
                    let l = p.lifter as f64;
                    1.0 + (l / 2.0) * (std::f64::consts::PI * (k + 1) as f64 / l).sin()
                }
            })
            .collect();

        let frames = framing
            .frames(&emphasized)
            .map(|frame| {
                let power = fft.power_spectrum(frame);
                let log_mel: Vec<f64> = bank
                    .iter()
                    .map(|filter| {
                        let energy: f32 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
                        10.0 * (energy.max(1e-10) as f64).log10()
                    })
                    .collect();
                dct.iter()
                    .zip(&lifter)
                    .map(|(basis, lift)| {
                        basis.iter().zip(&log_mel).map(|(b, v)| b * v).sum::<f64>() * lift
                    })
                    .collect()
            })
            .collect();
        Ok(frames)
    }
}

impl FeatureExtractor for MelExtractor {
    fn family(&self) -> FeatureFamily {
        FeatureFamily::Mel
    }

    fn columns(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for block in self.blocks() {
            for k in 1..=self.params.num_mfcc {
                columns.extend(stat_columns(&format!("{block}_{k:02}"), &self.params.statistics));
            }
        }
        columns
    }

    fn extract(&self, waveform: &[f32], sample_rate: u32) -> Result<FeatureVector, FeatureError> {
        let base = self.cepstra(waveform, sample_rate)?;
        let mut trajectories = vec![base];
        if self.params.use_delta {
            let d1 = delta(&trajectories[0], self.params.delta_width);
            trajectories.push(d1);
        }
        if self.params.use_delta_delta {
            let d2 = delta(&trajectories[1], self.params.delta_width);
            trajectories.push(d2);
        }

        let mut vector = FeatureVector::with_capacity(self.columns().len());
        for (block, frames) in self.blocks().into_iter().zip(&trajectories) {
            for k in 0..self.params.num_mfcc {
                let series: Vec<f64> = frames.iter().map(|frame| frame[k]).collect();
                vector.push_stats(
                    &format!("{block}_{:02}", k + 1),
                    &self.params.statistics,
                    summarise(&series, &self.params.statistics),
                );
            }
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
    fn test_column_count_with_deltas() {
        let params = MelParams {
            use_delta: true,
            use_delta_delta: true,
            ..MelParams::default()
        };
        assert_eq!(MelExtractor::new(params).columns().len(), 39);

        let params = MelParams {
            use_delta: true,
            ..MelParams::default()
        };
        assert_eq!(MelExtractor::new(params).columns().len(), 26);

        assert_eq!(MelExtractor::new(MelParams::default()).columns().len(), 13);
    }

    #[test]
    fn test_extract_matches_columns() {
        let params = MelParams {
            use_delta: true,
            use_delta_delta: true,
            statistics: vec![Statistic::Mean, Statistic::Std],
            ..MelParams::default()
        };
        let extractor = MelExtractor::new(params);
        let signal = generate_sine_wave(16_000, 440.0, 16_000);
        let vector = extractor.extract(&signal, 16_000).unwrap();
        assert_eq!(vector.columns(), extractor.columns());
        assert!(!vector.has_missing());
        assert_eq!(vector.len(), 78);
    }

    #[test]
    fn test_extract_is_deterministic() {
        let extractor = MelExtractor::new(MelParams {
            use_delta: true,
            ..MelParams::default()
        });
        let signal = generate_sine_wave(16_000, 220.0, 8_000);
        let a = extractor.extract(&signal, 16_000).unwrap();
        let b = extractor.extract(&signal, 16_000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_audio_rejected() {
        let extractor = MelExtractor::new(MelParams::default());
        let err = extractor.extract(&[0.1; 100], 16_000).unwrap_err();
        assert!(matches!(err, FeatureError::ShortAudio { required: 400, .. }));
    }

    #[test]
    fn test_delta_of_linear_ramp_is_constant() {
        let frames: Vec<Vec<f64>> = (0..20).map(|t| vec![t as f64 * 2.0]).collect();
        let d = delta(&frames, 5);
        // interior frames see the full regression window
        for t in 2..18 {
            assert!((d[t][0] - 2.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_filter_bank_shape_and_range() {
        let bank = mel_filter_bank(40, 400, 16_000, 150.0, 4000.0);
        assert_eq!(bank.len(), 40);
        assert_eq!(bank[0].len(), 201);
        for filter in &bank {
            assert!(filter.iter().all(|w| (0.0..=1.0).contains(w)));
        }
        // nothing above fmax
        assert!(bank.iter().all(|f| f[150..].iter().all(|w| *w == 0.0)));
    }

    #[test]
    fn test_validation() {
        assert!(MelParams::default().validate(16_000).is_ok());
        let bad = MelParams {
            use_delta_delta: true,
            ..MelParams::default()
        };
        assert!(bad.validate(16_000).is_err());
        let bad = MelParams {
            fmax_hz: 9_000.0,
            ..MelParams::default()
        };
        assert!(bad.validate(16_000).is_err());
        let bad = MelParams {
            delta_width: 4,
            ..MelParams::default()
        };
        assert!(bad.validate(16_000).is_err());
    }
}
