// Temporal module - time-domain frame descriptors
//
// Zero-crossing rate for the spectral family and RMS energy for the
// prosodic family, both computed directly on raw frames.

/// Temporal feature computation functions
#[derive(Debug, Default, Clone, Copy)]
pub struct TemporalFeatures;

impl TemporalFeatures {
    /// Compute zero-crossing rate (ZCR)
    ///
    /// Formula: ZCR = (1 / (N - 1)) × Σ [sign(x[n]) != sign(x[n-1])]
    ///
    /// # Returns
    /// Zero-crossing rate (0.0 to 1.0)
    pub fn compute_zcr(&self, audio: &[f32]) -> f32 {
        if audio.len() < 2 {
            return 0.0;
        }

        let crossings = audio
            .windows(2)
            .filter(|pair| (pair[1] >= 0.0) != (pair[0] >= 0.0))
            .count();

        crossings as f32 / (audio.len() - 1) as f32
    }

    /// Root-mean-square amplitude of a frame
    pub fn compute_rms(&self, audio: &[f32]) -> f32 {
        if audio.is_empty() {
            return 0.0;
        }
        (audio.iter().map(|s| s * s).sum::<f32>() / audio.len() as f32).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zcr_alternating_signal() {
        let temporal = TemporalFeatures;
        let alternating: Vec<f32> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert_eq!(temporal.compute_zcr(&alternating), 1.0);
        assert_eq!(temporal.compute_zcr(&[0.5; 50]), 0.0);
        assert_eq!(temporal.compute_zcr(&[0.5]), 0.0);
    }

    #[test]
    fn test_rms_of_constant_and_sine() {
        let temporal = TemporalFeatures;
        assert!((temporal.compute_rms(&[0.5; 64]) - 0.5).abs() < 1e-6);
        let sine: Vec<f32> = (0..1600)
            .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 16_000.0).sin())
            .collect();
        assert!((temporal.compute_rms(&sine) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
        assert_eq!(temporal.compute_rms(&[]), 0.0);
    }
}
