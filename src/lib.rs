// Acoustic Atlas - batch acoustic feature extraction for speech corpora
// Decodes a corpus, extracts per-file feature vectors and assembles one
// projector-ready table

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod pipeline;
pub mod projector;
pub mod report;
pub mod table;

// Re-exports for convenience
pub use analysis::embedding::{SpeakerEmbedder, SpeakerExtractor, SpeakerParams};
pub use analysis::{FeatureExtractor, FeatureFamily, FeatureSpec, FeatureVector};
pub use audio::{AudioLoader, Waveform};
pub use config::{OutputConfig, PipelineConfig};
pub use error::{DecodeError, ErrorCode, FeatureError, PipelineError, SchemaMismatch};
pub use metadata::{FilenameMetadataParser, MetadataRecord, MetadataSchema};
pub use pipeline::{CancelToken, Extraction, ExtractionOrchestrator, InputSource};
pub use projector::{ColumnRoles, ProjectorExport, VisualizationSink};
pub use report::RunReport;
pub use table::{Schema, Table, TableAssembler, Value};
