// Table module - row assembly, NA handling and delimited output
//
// Column order is fixed by the schema: identity (`file`, `path`), metadata
// fields in user order, feature blocks in selection order, then the optional
// `selection` placeholder. Rows are aligned to the schema by column name, so
// a family that produced nothing still contributes explicit NA cells.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::analysis::{FeatureFamily, FeatureVector};
use crate::error::PipelineError;
use crate::metadata::MetadataRecord;

pub const FILE_COLUMN: &str = "file";
pub const PATH_COLUMN: &str = "path";
pub const SELECTION_COLUMN: &str = "selection";

/// Names no metadata field may take
pub const RESERVED_COLUMNS: [&str; 3] = [FILE_COLUMN, PATH_COLUMN, SELECTION_COLUMN];

/// What a column holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Identity,
    Metadata,
    Feature(FeatureFamily),
    Selection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub role: ColumnRole,
}

/// Ordered column layout shared by every row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Build the layout from its parts
    ///
    /// `features` holds one `(family, columns)` block per selected family.
    pub fn new(
        metadata: &[String],
        features: &[(FeatureFamily, Vec<String>)],
        append_selection: bool,
    ) -> Self {
        let mut columns = vec![
            Column {
                name: FILE_COLUMN.to_string(),
                role: ColumnRole::Identity,
            },
            Column {
                name: PATH_COLUMN.to_string(),
                role: ColumnRole::Identity,
            },
        ];
        columns.extend(metadata.iter().map(|name| Column {
            name: name.clone(),
            role: ColumnRole::Metadata,
        }));
        for (family, names) in features {
            columns.extend(names.iter().map(|name| Column {
                name: name.clone(),
                role: ColumnRole::Feature(*family),
            }));
        }
        if append_selection {
            columns.push(Column {
                name: SELECTION_COLUMN.to_string(),
                role: ColumnRole::Selection,
            });
        }
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Names of columns with the given role predicate, in order
    pub fn names_where(&self, keep: impl Fn(ColumnRole) -> bool) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| keep(c.role))
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.names_where(|role| matches!(role, ColumnRole::Feature(_)))
    }

    /// First duplicated column name, if any
    pub fn duplicate(&self) -> Option<&str> {
        self.columns.iter().enumerate().find_map(|(i, c)| {
            self.columns[..i]
                .iter()
                .any(|prev| prev.name == c.name)
                .then_some(c.name.as_str())
        })
    }
}

/// One table cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.write_str(text),
            Value::Number(value) => write!(f, "{value}"),
            Value::Missing => f.write_str("NA"),
        }
    }
}

/// Everything one successfully processed file contributes
#[derive(Debug, Clone, PartialEq)]
pub struct FileRow {
    pub path: PathBuf,
    pub metadata: MetadataRecord,
    /// One vector per selected family, in selection order
    pub features: Vec<FeatureVector>,
}

/// Row aligned to a schema
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub path: PathBuf,
    pub values: Vec<Value>,
}

impl Row {
    pub fn has_missing(&self) -> bool {
        self.values.iter().any(Value::is_missing)
    }
}

/// Rows sharing one schema
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Schema,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_missing(&self) -> bool {
        self.rows.iter().any(Row::has_missing)
    }

    /// Cell by row index and column name
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.schema.index_of(column)?;
        self.rows.get(row).and_then(|r| r.values.get(index))
    }

    /// Feature cells of every row, in schema order
    pub fn feature_matrix(&self) -> Vec<Vec<Option<f64>>> {
        let indices: Vec<usize> = self
            .schema
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c.role, ColumnRole::Feature(_)))
            .map(|(i, _)| i)
            .collect();
        self.rows
            .iter()
            .map(|row| indices.iter().map(|&i| row.values[i].as_f64()).collect())
            .collect()
    }

    /// Serialise header + rows with the given delimiter
    pub fn write_delimited<W: Write>(&self, writer: W, delimiter: u8) -> Result<(), PipelineError> {
        let mut csv = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);
        csv.write_record(self.schema.names())?;
        for row in &self.rows {
            csv.write_record(row.values.iter().map(|v| v.to_string()))?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Write the table to `path`
    pub fn write_to_path(&self, path: &Path, delimiter: u8) -> Result<(), PipelineError> {
        let file = std::fs::File::create(path)?;
        self.write_delimited(std::io::BufWriter::new(file), delimiter)
    }
}

/// Table plus the rows removed for NA values
#[derive(Debug, Clone, PartialEq)]
pub struct Assembled {
    pub table: Table,
    pub dropped: Vec<PathBuf>,
}

/// Aligns file rows to one schema and removes incomplete rows
#[derive(Debug, Clone)]
pub struct TableAssembler {
    schema: Schema,
}

impl TableAssembler {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Align one file's outputs to the schema
    pub fn align(&self, file: &FileRow) -> Row {
        let values = self
            .schema
            .columns()
            .iter()
            .map(|column| match column.role {
                ColumnRole::Identity if column.name == FILE_COLUMN => Value::Text(
                    file.path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                ),
                ColumnRole::Identity => Value::Text(file.path.to_string_lossy().into_owned()),
                ColumnRole::Metadata => file
                    .metadata
                    .get(&column.name)
                    .map(|v| Value::Text(v.to_string()))
                    .unwrap_or(Value::Missing),
                ColumnRole::Feature(_) => file
                    .features
                    .iter()
                    .find_map(|vector| vector.get(&column.name))
                    .flatten()
                    .map(Value::Number)
                    .unwrap_or(Value::Missing),
                ColumnRole::Selection => Value::Number(0.0),
            })
            .collect();
        Row {
            path: file.path.clone(),
            values,
        }
    }

    /// Merge rows in order, dropping any row with a missing cell
    pub fn assemble(&self, files: &[FileRow]) -> Assembled {
        let mut rows = Vec::with_capacity(files.len());
        let mut dropped = Vec::new();
        for file in files {
            let row = self.align(file);
            if row.has_missing() {
                dropped.push(row.path);
            } else {
                rows.push(row);
            }
        }

        if !dropped.is_empty() {
            warn!(
                "[TableAssembler] Dropped {} of {} row(s) with missing values; the projector requires a complete numeric matrix",
                dropped.len(),
                files.len()
            );
        }

        Assembled {
            table: Table::new(self.schema.clone(), rows),
            dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{FilenameMetadataParser, MetadataSchema};

    fn schema() -> Schema {
        Schema::new(
            &["speaker".to_string()],
            &[
                (FeatureFamily::Mel, vec!["mfcc_01_mean".to_string()]),
                (FeatureFamily::Lpcc, vec!["lpcc_01_mean".to_string()]),
            ],
            true,
        )
    }

    fn file_row(name: &str, mel: Option<f64>, lpcc: Option<f64>) -> FileRow {
        let parser = FilenameMetadataParser::new(MetadataSchema::new('_', ["speaker", "-"]));
        let mut mel_vector = FeatureVector::new();
        mel_vector.push("mfcc_01_mean", mel);
        let mut lpcc_vector = FeatureVector::new();
        lpcc_vector.push("lpcc_01_mean", lpcc);
        FileRow {
            path: PathBuf::from(format!("corpus/{name}")),
            metadata: parser.parse(name).unwrap(),
            features: vec![mel_vector, lpcc_vector],
        }
    }

    #[test]
    fn test_schema_order() {
        assert_eq!(
            schema().names(),
            vec!["file", "path", "speaker", "mfcc_01_mean", "lpcc_01_mean", "selection"]
        );
        assert_eq!(schema().feature_names(), vec!["mfcc_01_mean", "lpcc_01_mean"]);
        assert!(schema().duplicate().is_none());
    }

    #[test]
    fn test_align_fills_identity_and_selection() {
        let assembler = TableAssembler::new(schema());
        let row = assembler.align(&file_row("spk1_a.wav", Some(1.5), Some(-2.0)));
        assert_eq!(
            row.values,
            vec![
                Value::Text("spk1_a.wav".into()),
                Value::Text("corpus/spk1_a.wav".into()),
                Value::Text("spk1".into()),
                Value::Number(1.5),
                Value::Number(-2.0),
                Value::Number(0.0),
            ]
        );
    }

    #[test]
    fn test_assemble_drops_rows_with_missing_values() {
        let assembler = TableAssembler::new(schema());
        let files = vec![
            file_row("spk1_a.wav", Some(1.0), Some(1.0)),
            file_row("spk2_a.wav", None, Some(1.0)),
            file_row("spk3_a.wav", Some(3.0), Some(3.0)),
        ];
        let assembled = assembler.assemble(&files);
        assert_eq!(assembled.table.len(), 2);
        assert_eq!(assembled.dropped, vec![PathBuf::from("corpus/spk2_a.wav")]);
        assert_eq!(
            assembled.table.value(1, "speaker"),
            Some(&Value::Text("spk3".into()))
        );
        assert!(!assembled.table.has_missing());
    }

    #[test]
    fn test_missing_family_output_becomes_na_not_omitted() {
        let assembler = TableAssembler::new(schema());
        let mut file = file_row("spk1_a.wav", Some(1.0), Some(1.0));
        file.features.truncate(1);
        let row = assembler.align(&file);
        assert_eq!(row.values.len(), 6);
        assert_eq!(row.values[4], Value::Missing);
    }

    #[test]
    fn test_write_delimited() {
        let assembler = TableAssembler::new(schema());
        let assembled = assembler.assemble(&[file_row("spk1_a.wav", Some(0.25), Some(2.0))]);
        let mut out = Vec::new();
        assembled.table.write_delimited(&mut out, b';').unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "file;path;speaker;mfcc_01_mean;lpcc_01_mean;selection");
        assert_eq!(lines[1], "spk1_a.wav;corpus/spk1_a.wav;spk1;0.25;2;0");
    }

    #[test]
    fn test_feature_matrix() {
        let assembler = TableAssembler::new(schema());
        let assembled = assembler.assemble(&[
            file_row("spk1_a.wav", Some(1.0), Some(2.0)),
            file_row("spk2_a.wav", Some(3.0), Some(4.0)),
        ]);
        assert_eq!(
            assembled.table.feature_matrix(),
            vec![vec![Some(1.0), Some(2.0)], vec![Some(3.0), Some(4.0)]]
        );
    }
}
