// Loader module - decode any supported container to a mono waveform
//
// Symphonia probes the container (extension used only as a hint), the first
// decodable track is decoded packet by packet, channels are averaged to mono
// and the result is resampled to the pipeline's target rate.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use super::resample::resample_mono;
use crate::error::DecodeError;

/// Mono waveform at a known sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Mono samples, nominally in [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Rate of the stream before resampling
    pub source_sample_rate: u32,
    /// Channel count of the stream before down-mixing
    pub source_channels: usize,
}

impl Waveform {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Audio loader producing mono waveforms at one target rate
#[derive(Debug, Clone, Copy)]
pub struct AudioLoader {
    target_sample_rate: u32,
}

impl Default for AudioLoader {
    fn default() -> Self {
        Self::new(16_000)
    }
}

impl AudioLoader {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Decode `path` to a mono waveform at the target rate
    ///
    /// # Returns
    /// * `Ok(Waveform)` - Decoded, down-mixed, resampled audio
    /// * `Err(DecodeError)` - Unreadable file, unknown format, corrupt or empty
    ///   stream, or resampling failure; the error always names the path
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Waveform, DecodeError> {
        let path = path.as_ref();
        let (mono, source_rate, channels) = decode_mono(path)?;

        debug!(
            "[AudioLoader] Decoded {}: {} samples @ {} Hz, {} channel(s)",
            path.display(),
            mono.len(),
            source_rate,
            channels
        );

        let samples = resample_mono(&mono, source_rate, self.target_sample_rate).map_err(|reason| {
            DecodeError::ResampleFailed {
                path: path.to_path_buf(),
                reason,
            }
        })?;

        Ok(Waveform {
            samples,
            sample_rate: self.target_sample_rate,
            source_sample_rate: source_rate,
            source_channels: channels,
        })
    }
}

/// Decode the first audio track, averaging channels
fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32, usize), DecodeError> {
    let file = File::open(path).map_err(|e| DecodeError::Unreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let unsupported = |reason: String| DecodeError::Unsupported {
        path: path.to_path_buf(),
        reason,
    };
    let corrupt = |reason: String| DecodeError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| unsupported(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| unsupported("no audio track".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| unsupported(e.to_string()))?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let mut mono: Vec<f32> = Vec::new();
    let mut buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(corrupt(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // a damaged packet is skipped, the stream continues
            Err(SymphoniaError::DecodeError(reason)) => {
                debug!("[AudioLoader] Skipping bad packet in {}: {}", path.display(), reason);
                continue;
            }
            Err(e) => return Err(corrupt(e.to_string())),
        };

        let spec = *decoded.spec();
        sample_rate = Some(spec.rate);
        channels = spec.channels.count();
        let frames = decoded.capacity();
        if buffer.as_ref().map_or(true, |b| b.capacity() < frames * channels) {
            buffer = Some(SampleBuffer::new(frames as u64, spec));
        }
        let Some(buf) = buffer.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        let interleaved = buf.samples();
        if channels <= 1 {
            mono.extend_from_slice(interleaved);
        } else {
            mono.extend(
                interleaved
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    let sample_rate = sample_rate.ok_or_else(|| corrupt("sample rate unknown".to_string()))?;
    if mono.is_empty() {
        return Err(corrupt("stream contains no samples".to_string()));
    }
    Ok((mono, sample_rate, channels.max(1)))
}
