// FFT module - windowed spectra for frame-based analysis
//
// Frames are multiplied by a precomputed analysis window, zero-padded to the
// transform size and transformed; only the non-negative frequency half is
// returned (size = fft_size / 2 + 1).

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// FFT processor bound to one transform size and analysis window
pub struct FftProcessor {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
}

impl FftProcessor {
    /// Create a processor for `fft_size`-point transforms
    ///
    /// # Arguments
    /// * `fft_size` - Transform length (any size; rustfft handles non powers of two)
    /// * `window` - Analysis window applied to each frame (length <= fft_size)
    pub fn new(fft_size: usize, window: Vec<f32>) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            forward: planner.plan_fft_forward(fft_size),
            inverse: planner.plan_fft_inverse(fft_size),
            fft_size,
            window,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of bins in the one-sided spectrum
    pub fn bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Frequency in Hz of bin `k`
    pub fn bin_frequency(&self, k: usize, sample_rate: u32) -> f32 {
        k as f32 * sample_rate as f32 / self.fft_size as f32
    }

    fn transform(&self, frame: &[f32]) -> Vec<Complex<f32>> {
        let mut buffer: Vec<Complex<f32>> = Vec::with_capacity(self.fft_size);
        for (i, &sample) in frame.iter().take(self.fft_size).enumerate() {
            let w = self.window.get(i).copied().unwrap_or(0.0);
            buffer.push(Complex::new(sample * w, 0.0));
        }
        buffer.resize(self.fft_size, Complex::new(0.0, 0.0));
        self.forward.process(&mut buffer);
        buffer
    }

    /// Magnitude spectrum |X[k]| for k in 0..=fft_size/2
    pub fn magnitude_spectrum(&self, frame: &[f32]) -> Vec<f32> {
        self.transform(frame)[..self.bins()]
            .iter()
            .map(|c| c.norm())
            .collect()
    }

    /// Power spectrum |X[k]|^2 for k in 0..=fft_size/2
    pub fn power_spectrum(&self, frame: &[f32]) -> Vec<f32> {
        self.transform(frame)[..self.bins()]
            .iter()
            .map(|c| c.norm_sqr())
            .collect()
    }

    /// Real cepstrum: IFFT(log |X|), normalised by the transform size
    pub fn real_cepstrum(&self, frame: &[f32]) -> Vec<f32> {
        let spectrum = self.transform(frame);
        let mut log_mag: Vec<Complex<f32>> = spectrum
            .iter()
            .map(|c| Complex::new(c.norm().max(1e-10).ln(), 0.0))
            .collect();
        self.inverse.process(&mut log_mag);
        let scale = 1.0 / self.fft_size as f32;
        log_mag.iter().map(|c| c.re * scale).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::frames::hann;

    fn sine(sample_rate: u32, frequency: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_peak_bin_matches_frequency() {
        let fft = FftProcessor::new(400, hann(400));
        let spectrum = fft.magnitude_spectrum(&sine(16_000, 1_000.0, 400));
        assert_eq!(spectrum.len(), 201);
        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        assert!((fft.bin_frequency(peak, 16_000) - 1_000.0).abs() <= 40.0);
    }

    #[test]
    fn test_short_frame_is_zero_padded() {
        let fft = FftProcessor::new(512, hann(512));
        let power = fft.power_spectrum(&[0.5; 100]);
        assert_eq!(power.len(), 257);
        assert!(power.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_cepstrum_of_silence_is_flat() {
        let fft = FftProcessor::new(256, hann(256));
        let cep = fft.real_cepstrum(&[0.0; 256]);
        // log floor is constant, so all energy sits at quefrency 0
        assert!(cep[1..].iter().all(|c| c.abs() < 1e-3));
    }
}
