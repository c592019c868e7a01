// Probe module - signature-based audio detection and directory scanning
//
// Audio is recognised by its leading bytes (infer), never by extension, so
// sidecar files (transcripts, TextGrids, JSON) sharing a recording's name
// are skipped even when misnamed.

use std::fs;
use std::path::{Path, PathBuf};

use infer::MatcherType;
use tracing::debug;

use crate::error::PipelineError;

/// Detected audio container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioKind {
    pub mime_type: &'static str,
    pub extension: &'static str,
}

/// Identify the audio container of `path` from its signature
///
/// # Returns
/// * `Ok(Some(kind))` - File starts with a known audio signature
/// * `Ok(None)` - Readable but not audio
/// * `Err` - File could not be read
pub fn detect_audio_kind(path: &Path) -> std::io::Result<Option<AudioKind>> {
    Ok(infer::get_from_path(path)?
        .filter(|kind| kind.matcher_type() == MatcherType::Audio)
        .map(|kind| AudioKind {
            mime_type: kind.mime_type(),
            extension: kind.extension(),
        }))
}

/// True when `path` carries an audio signature; unreadable files are not audio
pub fn is_audio(path: &Path) -> bool {
    matches!(detect_audio_kind(path), Ok(Some(_)))
}

/// Result of scanning one directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryScan {
    /// Audio files, sorted by file name
    pub audio: Vec<PathBuf>,
    /// Regular files without an audio signature, sorted by file name
    pub skipped: Vec<PathBuf>,
}

/// List the direct children of `dir` that carry an audio signature
///
/// Subdirectories are not descended into.
pub fn scan_directory(dir: &Path) -> Result<DirectoryScan, PipelineError> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::Input {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut scan = DirectoryScan::default();
    for path in files {
        if is_audio(&path) {
            scan.audio.push(path);
        } else {
            debug!("[Probe] Skipping non-audio file {}", path.display());
            scan.skipped.push(path);
        }
    }

    debug!(
        "[Probe] Scanned {}: {} audio, {} skipped",
        dir.display(),
        scan.audio.len(),
        scan.skipped.len()
    );
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..1_600 {
            writer.write_sample(((i % 50) * 200) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_detects_wav_by_signature() {
        let dir = tempfile::tempdir().unwrap();
        // extension deliberately misleading
        let path = dir.path().join("take.dat");
        write_wav(&path);
        let kind = detect_audio_kind(&path).unwrap().unwrap();
        assert_eq!(kind.extension, "wav");
        assert!(is_audio(&path));
    }

    #[test]
    fn test_text_named_wav_is_not_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.wav");
        fs::write(&path, "speaker,age\n").unwrap();
        assert!(!is_audio(&path));
        assert!(!is_audio(&dir.path().join("missing.wav")));
    }

    #[test]
    fn test_scan_sorts_and_skips_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("b_02.wav"));
        write_wav(&dir.path().join("a_01.wav"));
        fs::write(dir.path().join("a_01.txt"), "transcript").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        write_wav(&dir.path().join("nested").join("c_03.wav"));

        let scan = scan_directory(dir.path()).unwrap();
        let names: Vec<_> = scan
            .audio
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_01.wav", "b_02.wav"]);
        assert_eq!(scan.skipped.len(), 1);
    }

    #[test]
    fn test_scan_missing_directory_is_input_error() {
        let err = scan_directory(Path::new("/nonexistent/corpus")).unwrap_err();
        assert!(matches!(err, PipelineError::Input { .. }));
    }
}
