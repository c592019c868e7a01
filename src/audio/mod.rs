// Audio module - decoding, resampling and input discovery

pub mod loader;
pub mod probe;
pub mod resample;

// Re-export commonly used types for convenience
pub use loader::{AudioLoader, Waveform};
pub use probe::{detect_audio_kind, is_audio, scan_directory, AudioKind, DirectoryScan};
pub use resample::resample_mono;
