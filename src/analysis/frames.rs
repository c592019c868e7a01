// Frames module - short-time framing shared by every extractor
//
// Frames start at sample 0 and advance by `hop`; only full windows are
// produced (no centring or zero padding), so a waveform shorter than one
// window yields no frame and is rejected as short audio.

use std::f32::consts::PI;

use crate::error::FeatureError;

/// Convert a duration in milliseconds to a sample count (at least 1)
pub fn ms_to_samples(ms: f32, sample_rate: u32) -> usize {
    ((ms / 1000.0) * sample_rate as f32).round().max(1.0) as usize
}

/// First-order pre-emphasis filter: y[n] = x[n] - coef * x[n-1]
pub fn pre_emphasis(signal: &[f32], coef: f32) -> Vec<f32> {
    if coef == 0.0 {
        return signal.to_vec();
    }
    let mut out = Vec::with_capacity(signal.len());
    let mut prev = 0.0f32;
    for (i, &sample) in signal.iter().enumerate() {
        out.push(if i == 0 { sample } else { sample - coef * prev });
        prev = sample;
    }
    out
}

/// Symmetric Hamming window
pub fn hamming(len: usize) -> Vec<f32> {
    if len <= 1 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| 0.54 - 0.46 * ((2.0 * PI * i as f32) / (len as f32 - 1.0)).cos())
        .collect()
}

/// Symmetric Hann window
pub fn hann(len: usize) -> Vec<f32> {
    if len <= 1 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| 0.5 * (1.0 - ((2.0 * PI * i as f32) / (len as f32 - 1.0)).cos()))
        .collect()
}

/// Window/hop geometry in samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framing {
    pub window: usize,
    pub hop: usize,
}

impl Framing {
    pub fn new(window: usize, hop: usize) -> Self {
        Self {
            window: window.max(1),
            hop: hop.max(1),
        }
    }

    /// Build from millisecond durations at the given sample rate
    pub fn from_ms(window_ms: f32, hop_ms: f32, sample_rate: u32) -> Self {
        Self::new(
            ms_to_samples(window_ms, sample_rate),
            ms_to_samples(hop_ms, sample_rate),
        )
    }

    /// Reject signals shorter than one analysis window
    pub fn require(&self, signal: &[f32]) -> Result<(), FeatureError> {
        if signal.len() < self.window {
            Err(FeatureError::ShortAudio {
                required: self.window,
                available: signal.len(),
            })
        } else {
            Ok(())
        }
    }

    /// Number of full frames in a signal of `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        if len < self.window {
            0
        } else {
            (len - self.window) / self.hop + 1
        }
    }

    /// Iterate over full frames
    pub fn frames<'a>(&self, signal: &'a [f32]) -> impl Iterator<Item = &'a [f32]> + 'a {
        let Framing { window, hop } = *self;
        let count = self.frame_count(signal.len());
        (0..count).map(move |i| &signal[i * hop..i * hop + window])
    }
}
