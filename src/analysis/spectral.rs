// Spectral module - low-level frequency-domain descriptors
//
// Per frame: centroid, bandwidth, octave-band contrast, flatness, roll-off,
// entropy (all from the Hann-windowed magnitude spectrum) and zero-crossing
// rate (time domain). Each per-frame series is reduced with the configured
// statistics.
//
// References:
// - Peeters, G. (2004). A large set of audio features for sound description
// - Jiang, D. et al. (2002). Music type classification by spectral contrast

use serde::{Deserialize, Serialize};

use super::fft::FftProcessor;
use super::frames::{hann, Framing};
use super::stats::{stat_columns, summarise, Statistic};
use super::temporal::TemporalFeatures;
use super::{check_framing, check_statistics, FeatureExtractor, FeatureFamily, FeatureVector};
use crate::error::FeatureError;

/// Parameters of the low-level spectral family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpectralParams {
    pub window_length_ms: f32,
    pub hop_length_ms: f32,
    /// Fraction of spectral energy below the roll-off frequency
    pub rolloff_percent: f32,
    /// Number of octave bands above `contrast_fmin_hz` (contrast yields bands + 1 values)
    pub contrast_bands: usize,
    pub contrast_fmin_hz: f32,
    /// Fraction of each band used for the peak / valley estimates
    pub contrast_quantile: f32,
    /// Collapse the contrast bands into their average
    pub average_contrast: bool,
    pub statistics: Vec<Statistic>,
}

impl Default for SpectralParams {
    fn default() -> Self {
        Self {
            window_length_ms: 25.0,
            hop_length_ms: 10.0,
            rolloff_percent: 0.85,
            contrast_bands: 5,
            contrast_fmin_hz: 200.0,
            contrast_quantile: 0.02,
            average_contrast: false,
            statistics: vec![Statistic::Mean, Statistic::Std],
        }
    }
}

impl SpectralParams {
    pub fn validate(&self, sample_rate: u32) -> Result<(), String> {
        check_framing(self.window_length_ms, self.hop_length_ms)?;
        if !(self.rolloff_percent > 0.0 && self.rolloff_percent < 1.0) {
            return Err(format!(
                "rolloff_percent must be in (0, 1) (got {})",
                self.rolloff_percent
            ));
        }
        if self.contrast_bands == 0 {
            return Err("contrast_bands must be >= 1".to_string());
        }
        let top = self.contrast_fmin_hz * 2f32.powi(self.contrast_bands as i32);
        let nyquist = sample_rate as f32 / 2.0;
        if self.contrast_fmin_hz <= 0.0 || top >= nyquist {
            return Err(format!(
                "contrast bands reach {top} Hz, must stay below Nyquist ({nyquist} Hz)"
            ));
        }
        if !(self.contrast_quantile > 0.0 && self.contrast_quantile < 0.5) {
            return Err(format!(
                "contrast_quantile must be in (0, 0.5) (got {})",
                self.contrast_quantile
            ));
        }
        check_statistics(&self.statistics)
    }
}

/// Spectral feature computation functions
pub struct SpectralFeatures {
    sample_rate: u32,
    fft_size: usize,
}

impl SpectralFeatures {
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `fft_size` - FFT window size
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            sample_rate,
            fft_size,
        }
    }

    fn bin_width(&self) -> f32 {
        self.sample_rate as f32 / self.fft_size as f32
    }

    /// Compute spectral centroid (weighted mean frequency)
    ///
    /// Formula: centroid = Σ(f_i × |X[i]|) / Σ|X[i]|
    ///
    /// # Returns
    /// Spectral centroid in Hz, 0 for silence
    pub fn compute_centroid(&self, spectrum: &[f32]) -> f32 {
        let freq_bin_width = self.bin_width();

        let weighted_sum: f32 = spectrum
            .iter()
            .enumerate()
            .map(|(i, &mag)| i as f32 * freq_bin_width * mag)
            .sum();

        let magnitude_sum: f32 = spectrum.iter().sum();

        if magnitude_sum > 1e-10 {
            weighted_sum / magnitude_sum
        } else {
            0.0
        }
    }

    /// Compute spectral bandwidth (magnitude-weighted spread around the centroid)
    ///
    /// Formula: bandwidth = sqrt(Σ|X[i]| (f_i - centroid)² / Σ|X[i]|)
    pub fn compute_bandwidth(&self, spectrum: &[f32], centroid: f32) -> f32 {
        let magnitude_sum: f32 = spectrum.iter().sum();
        if magnitude_sum <= 1e-10 {
            return 0.0;
        }
        let freq_bin_width = self.bin_width();
        let spread: f32 = spectrum
            .iter()
            .enumerate()
            .map(|(i, &mag)| {
                let dev = i as f32 * freq_bin_width - centroid;
                mag * dev * dev
            })
            .sum();
        (spread / magnitude_sum).sqrt()
    }

    /// Compute spectral flatness (tonality measure)
    ///
    /// Formula: flatness = geometric_mean(|X[i]|) / arithmetic_mean(|X[i]|)
    ///
    /// Returns value between 0 (tonal, e.g., sine wave) and 1 (noise-like).
    pub fn compute_flatness(&self, spectrum: &[f32]) -> f32 {
        // Filter out zero or near-zero values for geometric mean
        let non_zero_spectrum: Vec<f32> = spectrum
            .iter()
            .filter(|&&mag| mag > 1e-10)
            .copied()
            .collect();

        if non_zero_spectrum.is_empty() {
            return 0.0;
        }

        // Geometric mean: exp(mean(log(x)))
        let log_sum: f32 = non_zero_spectrum.iter().map(|&mag| mag.ln()).sum();
        let geometric_mean = (log_sum / non_zero_spectrum.len() as f32).exp();

        let arithmetic_mean: f32 =
            non_zero_spectrum.iter().sum::<f32>() / non_zero_spectrum.len() as f32;

        if arithmetic_mean > 1e-10 {
            (geometric_mean / arithmetic_mean).min(1.0)
        } else {
            0.0
        }
    }

    /// Compute spectral rolloff
    ///
    /// Finds the frequency below which `percent` of the spectral energy is contained.
    pub fn compute_rolloff(&self, spectrum: &[f32], percent: f32) -> f32 {
        let total_energy: f32 = spectrum.iter().map(|&mag| mag * mag).sum();

        if total_energy < 1e-10 {
            return 0.0;
        }

        let threshold = percent * total_energy;
        let freq_bin_width = self.bin_width();

        let mut cumulative_energy = 0.0;
        for (i, &mag) in spectrum.iter().enumerate() {
            cumulative_energy += mag * mag;
            if cumulative_energy >= threshold {
                return i as f32 * freq_bin_width;
            }
        }

        (spectrum.len() - 1) as f32 * freq_bin_width
    }

    /// Normalised spectral entropy of the power distribution (0 = single bin, 1 = flat)
    pub fn compute_entropy(&self, spectrum: &[f32]) -> f32 {
        let total: f32 = spectrum.iter().map(|&mag| mag * mag).sum();
        if total <= 1e-10 || spectrum.len() < 2 {
            return 0.0;
        }
        let entropy: f32 = spectrum
            .iter()
            .map(|&mag| mag * mag / total)
            .filter(|&p| p > 0.0)
            .map(|p| -p * p.log2())
            .sum();
        entropy / (spectrum.len() as f32).log2()
    }

    /// Octave-band spectral contrast in dB
    ///
    /// Band edges: 0, fmin, 2·fmin, ..., fmin·2^bands, last band open to Nyquist.
    /// Each band yields 10·log10(peak / valley) where peak and valley are the
    /// means of the top and bottom `quantile` fraction of its magnitudes.
    pub fn compute_contrast(
        &self,
        spectrum: &[f32],
        bands: usize,
        fmin: f32,
        quantile: f32,
    ) -> Vec<f32> {
        let freq_bin_width = self.bin_width();
        let mut edges = vec![0.0f32];
        edges.extend((0..=bands).map(|k| fmin * 2f32.powi(k as i32)));

        (0..=bands)
            .map(|band| {
                let low = edges[band];
                let high = edges[band + 1];
                let mut values: Vec<f32> = spectrum
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| {
                        let f = *i as f32 * freq_bin_width;
                        if band == bands {
                            f >= low
                        } else {
                            f >= low && f < high
                        }
                    })
                    .map(|(_, &mag)| mag)
                    .collect();
                if values.is_empty() {
                    return 0.0;
                }
                values.sort_by(|a, b| a.total_cmp(b));
                let take = ((quantile * values.len() as f32).round() as usize).max(1);
                let valley: f32 = values[..take].iter().sum::<f32>() / take as f32;
                let peak: f32 = values[values.len() - take..].iter().sum::<f32>() / take as f32;
                10.0 * (peak.max(1e-10) / valley.max(1e-10)).log10()
            })
            .collect()
    }
}

/// Low-level spectral extractor bound to one parameter set
pub struct SpectralExtractor {
    params: SpectralParams,
}

impl SpectralExtractor {
    pub fn new(params: SpectralParams) -> Self {
        Self { params }
    }

    fn series_names(&self) -> Vec<String> {
        let mut names = vec![
            "spectral_centroid".to_string(),
            "spectral_bandwidth".to_string(),
        ];
        if self.params.average_contrast {
            names.push("spectral_contrast".to_string());
        } else {
            names.extend((1..=self.params.contrast_bands + 1).map(|b| format!("spectral_contrast_{b:02}")));
        }
        names.extend(
            ["spectral_flatness", "spectral_rolloff", "zcr", "spectral_entropy"]
                .iter()
                .map(|s| s.to_string()),
        );
        names
    }
}

impl FeatureExtractor for SpectralExtractor {
    fn family(&self) -> FeatureFamily {
        FeatureFamily::Spectral
    }

    fn columns(&self) -> Vec<String> {
        self.series_names()
            .iter()
            .flat_map(|name| stat_columns(name, &self.params.statistics))
            .collect()
    }

    fn extract(&self, waveform: &[f32], sample_rate: u32) -> Result<FeatureVector, FeatureError> {
        let p = &self.params;
        let framing = Framing::from_ms(p.window_length_ms, p.hop_length_ms, sample_rate);
        framing.require(waveform)?;

        let fft = FftProcessor::new(framing.window, hann(framing.window));
        let spectral = SpectralFeatures::new(sample_rate, fft.fft_size());
        let temporal = TemporalFeatures;
        let names = self.series_names();
        let mut series: Vec<Vec<f64>> = vec![Vec::new(); names.len()];

        for frame in framing.frames(waveform) {
            let spectrum = fft.magnitude_spectrum(frame);
            let centroid = spectral.compute_centroid(&spectrum);
            let mut values = vec![centroid, spectral.compute_bandwidth(&spectrum, centroid)];
            let contrast = spectral.compute_contrast(
                &spectrum,
                p.contrast_bands,
                p.contrast_fmin_hz,
                p.contrast_quantile,
            );
            if p.average_contrast {
                values.push(contrast.iter().sum::<f32>() / contrast.len() as f32);
            } else {
                values.extend(contrast);
            }
            values.push(spectral.compute_flatness(&spectrum));
            values.push(spectral.compute_rolloff(&spectrum, p.rolloff_percent));
            values.push(temporal.compute_zcr(frame));
            values.push(spectral.compute_entropy(&spectrum));

            for (column, value) in series.iter_mut().zip(values) {
                column.push(value as f64);
            }
        }

        let mut vector = FeatureVector::with_capacity(names.len() * p.statistics.len());
        for (name, values) in names.iter().zip(&series) {
            vector.push_stats(name, &p.statistics, summarise(values, &p.statistics));
        }
        Ok(vector)
    }
}
