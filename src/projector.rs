// Projector module - hand-off of a finished table to a visualizer
//
// The embedding projector consumes two tab-separated files: `tensors.tsv`
// (one feature vector per line, no header) and `metadata.tsv` (header plus
// one label row per vector, same order). Both must describe a complete
// numeric matrix, so tables that still contain NA cells are refused.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::PipelineError;
use crate::table::{ColumnRole, Table};

/// Which columns label points and which span the embedding space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRoles {
    /// Identity, metadata and selection columns
    pub metadata: Vec<String>,
    /// Numeric feature columns
    pub features: Vec<String>,
}

impl ColumnRoles {
    pub fn from_table(table: &Table) -> Self {
        let schema = table.schema();
        Self {
            metadata: schema.names_where(|role| !matches!(role, ColumnRole::Feature(_))),
            features: schema.feature_names(),
        }
    }
}

/// Consumer of a finished feature table
pub trait VisualizationSink {
    fn present(&self, table: &Table, roles: &ColumnRoles) -> Result<(), PipelineError>;
}

/// Writes embedding-projector input files into a directory
#[derive(Debug, Clone)]
pub struct ProjectorExport {
    dir: PathBuf,
}

impl ProjectorExport {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn tensors_path(&self) -> PathBuf {
        self.dir.join("tensors.tsv")
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join("metadata.tsv")
    }
}

impl VisualizationSink for ProjectorExport {
    fn present(&self, table: &Table, roles: &ColumnRoles) -> Result<(), PipelineError> {
        if table.is_empty() {
            return Err(PipelineError::Visualization {
                reason: "table has no rows".to_string(),
            });
        }
        if table.has_missing() {
            return Err(PipelineError::Visualization {
                reason: "table contains NA values; the projector needs a complete numeric matrix"
                    .to_string(),
            });
        }

        let schema = table.schema();
        let lookup = |names: &[String]| -> Result<Vec<usize>, PipelineError> {
            names
                .iter()
                .map(|name| {
                    schema.index_of(name).ok_or_else(|| PipelineError::Visualization {
                        reason: format!("column '{name}' is not in the table"),
                    })
                })
                .collect()
        };
        let feature_idx = lookup(&roles.features)?;
        let metadata_idx = lookup(&roles.metadata)?;
        if feature_idx.is_empty() {
            return Err(PipelineError::Visualization {
                reason: "no feature columns to project".to_string(),
            });
        }

        fs::create_dir_all(&self.dir)?;

        let mut tensors = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_path(self.tensors_path())?;
        for row in table.rows() {
            tensors.write_record(feature_idx.iter().map(|&i| row.values[i].to_string()))?;
        }
        tensors.flush()?;

        let mut metadata = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(self.metadata_path())?;
        metadata.write_record(&roles.metadata)?;
        for row in table.rows() {
            metadata.write_record(metadata_idx.iter().map(|&i| row.values[i].to_string()))?;
        }
        metadata.flush()?;

        info!(
            "[Projector] Wrote {} point(s) x {} dimension(s) to {}",
            table.len(),
            feature_idx.len(),
            self.dir.display()
        );
        Ok(())
    }
}
