// Pipeline module - batch orchestration of decoding and feature extraction
//
// Run order:
// 1. Validate configuration and bind extractors (fatal on error)
// 2. Resolve inputs: directory scan or explicit list, audio by signature
// 3. Check every filename against the metadata schema (fatal on mismatch)
// 4. Per file on a bounded rayon pool: load -> metadata -> every family
// 5. Assemble the table in input order, drop NA rows, build and log the report
//
// Per-file failures never abort the batch: a decode failure or audio too
// short for every family excludes the file, a single family failure yields
// NA for that family only.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analysis::embedding::SpeakerEmbedder;
use crate::analysis::{FeatureExtractor, FeatureFamily, FeatureVector};
use crate::audio::{is_audio, scan_directory, AudioLoader};
use crate::config::PipelineConfig;
use crate::error::{log_decode_error, ErrorCode, FeatureError, PipelineError};
use crate::metadata::FilenameMetadataParser;
use crate::report::{Exclusion, ExclusionReason, FamilyFailure, RunReport};
use crate::table::{FileRow, Schema, Table, TableAssembler};

/// Where the recordings come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// Direct children of a directory, sorted by file name
    Directory(PathBuf),
    /// Explicit files, kept in the given order
    Files(Vec<PathBuf>),
}

/// Cooperative cancellation flag shared with the caller
///
/// Checked before each file starts; files already running finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Result of a run: the table plus what happened to every input
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub table: Table,
    pub report: RunReport,
}

/// Outcome of one file
enum FileOutcome {
    Row {
        row: FileRow,
        failures: Vec<FamilyFailure>,
    },
    Excluded(Exclusion),
}

/// Drives a batch from inputs to table
pub struct ExtractionOrchestrator {
    config: PipelineConfig,
    embedder: Option<Arc<dyn SpeakerEmbedder>>,
}

impl ExtractionOrchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            embedder: None,
        }
    }

    /// Provide the model backing the `speaker` family
    pub fn with_embedder(mut self, embedder: Arc<dyn SpeakerEmbedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, input: &InputSource) -> Result<Extraction, PipelineError> {
        self.run_with_cancel(input, &CancelToken::new())
    }

    pub fn run_with_cancel(
        &self,
        input: &InputSource,
        cancel: &CancelToken,
    ) -> Result<Extraction, PipelineError> {
        let started = Instant::now();
        let extractors = self.config.build_extractors(self.embedder.as_ref())?;
        let parser = FilenameMetadataParser::new(self.config.metadata.clone());
        let blocks: Vec<(FeatureFamily, Vec<String>)> = extractors
            .iter()
            .map(|e| (e.family(), e.columns()))
            .collect();
        let schema = Schema::new(
            &self.config.metadata.columns(),
            &blocks,
            self.config.output.append_selection,
        );
        if let Some(name) = schema.duplicate() {
            return Err(PipelineError::config(format!("column '{name}' appears twice")));
        }

        let (files, skipped) = resolve_inputs(input)?;
        if files.is_empty() {
            return Err(PipelineError::EmptyBatch { attempted: 0 });
        }
        parser.check_batch(&files)?;
        if files.len() == 1 {
            warn!("[Pipeline] Single input file; one observation cannot be meaningfully projected");
        }

        let workers = self.config.resolved_workers();
        info!(
            "[Pipeline] Extracting {} file(s) with {} worker(s), families: {}",
            files.len(),
            workers,
            extractors
                .iter()
                .map(|e| e.family().name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("atlas-worker-{idx}"))
            .build()
            .map_err(|e| PipelineError::WorkerPool {
                reason: e.to_string(),
            })?;

        let loader = AudioLoader::new(self.config.target_sample_rate);
        // indexed collect keeps input order
        let outcomes: Vec<FileOutcome> = pool.install(|| {
            files
                .par_iter()
                .map(|path| process_file(path, &loader, &parser, &extractors, cancel))
                .collect()
        });

        let mut report = RunReport {
            inputs: files.len(),
            skipped_non_audio: skipped,
            cancelled: cancel.is_cancelled(),
            embedder_version: self
                .embedder
                .as_ref()
                .filter(|_| extractors.iter().any(|e| e.family() == FeatureFamily::Speaker))
                .map(|e| e.model_version()),
            ..RunReport::default()
        };
        let mut rows = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                FileOutcome::Row { row, failures } => {
                    report.family_failures.extend(failures);
                    rows.push(row);
                }
                FileOutcome::Excluded(exclusion) => report.excluded.push(exclusion),
            }
        }

        if rows.is_empty() {
            report.log_summary();
            return Err(PipelineError::EmptyBatch {
                attempted: files.len(),
            });
        }

        let assembled = TableAssembler::new(schema).assemble(&rows);
        report.dropped_na_rows = assembled.dropped;
        report.rows = assembled.table.len();
        report.columns = assembled.table.schema().len();
        report.single_observation = report.rows == 1;
        if assembled.table.is_empty() {
            report.log_summary();
            return Err(PipelineError::EmptyBatch {
                attempted: files.len(),
            });
        }

        report.log_summary();
        info!(
            "[Pipeline] Finished in {:.2}s: {} row(s) from {} file(s)",
            started.elapsed().as_secs_f64(),
            report.rows,
            report.inputs
        );
        Ok(Extraction {
            table: assembled.table,
            report,
        })
    }
}

/// Expand an input source into audio files plus skipped non-audio files
fn resolve_inputs(input: &InputSource) -> Result<(Vec<PathBuf>, Vec<PathBuf>), PipelineError> {
    match input {
        InputSource::Directory(dir) => {
            let scan = scan_directory(dir)?;
            Ok((scan.audio, scan.skipped))
        }
        InputSource::Files(paths) => {
            let mut audio = Vec::with_capacity(paths.len());
            let mut skipped = Vec::new();
            for path in paths {
                if !path.is_file() {
                    return Err(PipelineError::Input {
                        path: path.clone(),
                        reason: "not a readable file".to_string(),
                    });
                }
                if is_audio(path) {
                    audio.push(path.clone());
                } else {
                    debug!("[Pipeline] Skipping non-audio input {}", path.display());
                    skipped.push(path.clone());
                }
            }
            Ok((audio, skipped))
        }
    }
}

/// Load one file and run every family on it
fn process_file(
    path: &Path,
    loader: &AudioLoader,
    parser: &FilenameMetadataParser,
    extractors: &[Box<dyn FeatureExtractor>],
    cancel: &CancelToken,
) -> FileOutcome {
    let excluded = |reason: ExclusionReason| {
        FileOutcome::Excluded(Exclusion {
            path: path.to_path_buf(),
            reason,
        })
    };

    if cancel.is_cancelled() {
        return excluded(ExclusionReason::Cancelled);
    }

    let waveform = match loader.load(path) {
        Ok(waveform) => waveform,
        Err(err) => {
            log_decode_error(&err, "process_file");
            return excluded(ExclusionReason::Decode {
                code: err.code(),
                message: err.message(),
            });
        }
    };

    let metadata = match parser.parse(path) {
        Ok(metadata) => metadata,
        // arity was checked for the whole batch before any decoding
        Err(err) => {
            return excluded(ExclusionReason::Metadata {
                message: err.to_string(),
            })
        }
    };

    let mut features = Vec::with_capacity(extractors.len());
    let mut failures = Vec::new();
    let mut short_families = 0;
    for extractor in extractors {
        match extractor.extract(&waveform.samples, waveform.sample_rate) {
            Ok(vector) => features.push(vector),
            Err(err) => {
                if matches!(err, FeatureError::ShortAudio { .. }) {
                    short_families += 1;
                }
                debug!(
                    "[Pipeline] {} failed on {}: {}",
                    extractor.family(),
                    path.display(),
                    err
                );
                failures.push(FamilyFailure {
                    path: path.to_path_buf(),
                    family: extractor.family(),
                    code: err.code(),
                    message: err.message(),
                });
                features.push(FeatureVector::missing(&extractor.columns()));
            }
        }
    }

    if short_families == extractors.len() {
        return excluded(ExclusionReason::ShortAudio {
            samples: waveform.samples.len(),
        });
    }

    debug!(
        "[Pipeline] Processed {} ({:.2}s)",
        path.display(),
        waveform.duration_seconds()
    );
    FileOutcome::Row {
        row: FileRow {
            path: path.to_path_buf(),
            metadata,
            features,
        },
        failures,
    }
}
