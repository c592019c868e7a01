// Resample module - band-limited sample-rate conversion for mono signals
//
// Single-pass rubato SincFixedIn over the whole signal, followed by a flush
// of the filter tail. The filter delay is trimmed so output sample 0 lines
// up with input sample 0, and the output is cut to round(len * ratio).

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

/// Resample a mono signal from `source_rate` to `target_rate`
///
/// # Returns
/// * `Ok(Vec<f32>)` - Resampled signal (the input, unchanged, when rates match)
/// * `Err(String)` - Resampler construction or processing failure
pub fn resample_mono(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>, String> {
    if source_rate == 0 || target_rate == 0 {
        return Err(format!("invalid sample rates {source_rate} -> {target_rate}"));
    }
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = target_rate as f64 / source_rate as f64;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, samples.len(), 1)
        .map_err(|e| format!("failed to create resampler: {e}"))?;

    let delay = resampler.output_delay();
    let mut output = resampler
        .process(&[samples.to_vec()], None)
        .map_err(|e| format!("resampling failed: {e}"))?
        .swap_remove(0);
    let tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(|e| format!("resampler flush failed: {e}"))?
        .swap_remove(0);
    output.extend(tail);

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let mut aligned: Vec<f32> = output.into_iter().skip(delay).take(expected).collect();
    aligned.resize(expected, 0.0);

    debug!(
        "[Resample] {} samples @ {} Hz -> {} samples @ {} Hz",
        samples.len(),
        source_rate,
        aligned.len(),
        target_rate
    );
    Ok(aligned)
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
    fn test_same_rate_is_identity() {
        let signal = generate_sine_wave(16_000, 440.0, 1_000);
        assert_eq!(resample_mono(&signal, 16_000, 16_000).unwrap(), signal);
    }

    #[test]
    fn test_downsample_length_and_amplitude() {
        let signal = generate_sine_wave(48_000, 440.0, 48_000);
        let resampled = resample_mono(&signal, 48_000, 16_000).unwrap();
        assert_eq!(resampled.len(), 16_000);
        let peak = resampled[1_000..15_000]
            .iter()
            .fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.05, "peak {peak}");
    }

    #[test]
    fn test_upsample_length() {
        let signal = generate_sine_wave(8_000, 200.0, 4_000);
        let resampled = resample_mono(&signal, 8_000, 16_000).unwrap();
        assert_eq!(resampled.len(), 8_000);
    }

    #[test]
    fn test_empty_input() {
        assert!(resample_mono(&[], 44_100, 16_000).unwrap().is_empty());
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(resample_mono(&[0.0; 10], 0, 16_000).is_err());
    }
}
