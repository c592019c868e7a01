// Metadata module - structured fields from filename conventions
//
// A recording named `spk012_f_read_03.wav` with separator `_` and fields
// `["speaker", "gender", "-", "take"]` yields speaker=spk012, gender=f,
// take=03. Fields named `-` occupy a token position but produce no column.
// Every file in a batch must split into exactly as many tokens as there are
// fields; disagreement is reported for all offending files at once.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SchemaMismatch, TokenCountMismatch};

/// Field name that keeps a token position without emitting a column
pub const IGNORED_FIELD: &str = "-";

/// Separator plus ordered field names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataSchema {
    pub separator: char,
    pub fields: Vec<String>,
}

impl Default for MetadataSchema {
    fn default() -> Self {
        Self {
            separator: '_',
            fields: Vec::new(),
        }
    }
}

impl MetadataSchema {
    pub fn new<S: Into<String>>(separator: char, fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            separator,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// An empty field list disables metadata entirely
    pub fn is_enabled(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Number of token positions the schema expects
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Output column names, in field order, without ignored positions
    pub fn columns(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.as_str() != IGNORED_FIELD)
            .cloned()
            .collect()
    }

    /// Reject empty and duplicate field names
    pub fn validate(&self) -> Result<(), String> {
        let columns = self.columns();
        for (i, name) in columns.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(format!("metadata field {} has an empty name", i + 1));
            }
            if columns[..i].contains(name) {
                return Err(format!("metadata field '{name}' is listed twice"));
            }
        }
        Ok(())
    }

    /// Fit the field list to `token_count` positions
    ///
    /// Existing names stay at their positions; extra names are truncated and
    /// missing positions are filled with `field_<n>` (1-based). Applying the
    /// same count twice is a no-op.
    pub fn realign(&mut self, token_count: usize) {
        self.fields.truncate(token_count);
        let start = self.fields.len();
        self.fields
            .extend((start + 1..=token_count).map(|n| format!("field_{n}")));
    }

    /// Switch separator and realign against a sample filename
    pub fn with_separator(mut self, separator: char, sample_name: &str) -> Self {
        self.separator = separator;
        let tokens = split_stem(&file_stem(Path::new(sample_name)), separator).len();
        self.realign(tokens);
        self
    }
}

/// Metadata of one file: field name -> token, in field order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataRecord {
    entries: Vec<(String, String)>,
}

impl MetadataRecord {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

/// File name without its final extension
fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn split_stem(stem: &str, separator: char) -> Vec<String> {
    stem.split(separator).map(str::to_string).collect()
}

/// Parses metadata out of filenames according to one schema
#[derive(Debug, Clone, Default)]
pub struct FilenameMetadataParser {
    schema: MetadataSchema,
}

impl FilenameMetadataParser {
    pub fn new(schema: MetadataSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &MetadataSchema {
        &self.schema
    }

    /// Tokens of a stem in order; empty tokens are kept
    pub fn split(&self, stem: &str) -> Vec<String> {
        split_stem(stem, self.schema.separator)
    }

    /// Token count of a path's stem
    pub fn token_count(&self, path: &Path) -> usize {
        self.split(&file_stem(path)).len()
    }

    /// Metadata record for one file (path or bare stem)
    pub fn parse<P: AsRef<Path>>(&self, path: P) -> Result<MetadataRecord, SchemaMismatch> {
        let path = path.as_ref();
        if !self.schema.is_enabled() {
            return Ok(MetadataRecord::default());
        }

        let tokens = self.split(&file_stem(path));
        if tokens.len() != self.schema.arity() {
            return Err(SchemaMismatch::single(
                path.to_path_buf(),
                self.schema.arity(),
                tokens.len(),
            ));
        }

        let entries = self
            .schema
            .fields
            .iter()
            .zip(tokens)
            .filter(|(field, _)| field.as_str() != IGNORED_FIELD)
            .map(|(field, token)| (field.clone(), token))
            .collect();
        Ok(MetadataRecord { entries })
    }

    /// Check every path's arity up front, collecting all offenders
    pub fn check_batch(&self, paths: &[PathBuf]) -> Result<(), SchemaMismatch> {
        if !self.schema.is_enabled() {
            return Ok(());
        }
        let mismatches: Vec<TokenCountMismatch> = paths
            .iter()
            .filter_map(|path| {
                let found = self.token_count(path);
                (found != self.schema.arity()).then(|| TokenCountMismatch {
                    path: path.clone(),
                    found,
                })
            })
            .collect();
        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(SchemaMismatch {
                expected: self.schema.arity(),
                mismatches,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(fields: &[&str]) -> FilenameMetadataParser {
        FilenameMetadataParser::new(MetadataSchema::new('_', fields.iter().copied()))
    }

    #[test]
    fn test_parse_drops_ignored_fields() {
        let parser = parser(&["speaker", "gender", "-", "take"]);
        let record = parser.parse("corpus/spk012_f_read_03.wav").unwrap();
        assert_eq!(record.len(), 3);
        assert_eq!(record.get("speaker"), Some("spk012"));
        assert_eq!(record.get("gender"), Some("f"));
        assert_eq!(record.get("take"), Some("03"));
        assert_eq!(record.get("-"), None);
        assert_eq!(parser.schema().columns(), vec!["speaker", "gender", "take"]);
    }

    #[test]
    fn test_split_keeps_empty_tokens() {
        let parser = parser(&[]);
        assert_eq!(parser.split("a__b"), vec!["a", "", "b"]);
        assert_eq!(parser.split("single"), vec!["single"]);
    }

    #[test]
    fn test_stem_strips_only_final_extension() {
        let parser = parser(&["a", "b"]);
        let record = parser.parse("x_y.z.wav").unwrap();
        assert_eq!(record.get("b"), Some("y.z"));
    }

    #[test]
    fn test_arity_mismatch() {
        let parser = parser(&["speaker", "take"]);
        let err = parser.parse("spk01_f_02.wav").unwrap_err();
        assert_eq!(err.expected, 2);
        assert_eq!(err.mismatches[0].found, 3);
    }

    #[test]
    fn test_check_batch_reports_every_offender() {
        let parser = parser(&["speaker", "take"]);
        let paths: Vec<PathBuf> = ["s1_01.wav", "s2_02_x.wav", "s3.wav", "s4_04.wav"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let err = parser.check_batch(&paths).unwrap_err();
        let offenders: Vec<_> = err.mismatches.iter().map(|m| m.path.clone()).collect();
        assert_eq!(offenders, vec![PathBuf::from("s2_02_x.wav"), PathBuf::from("s3.wav")]);
        assert!(err.to_string().contains("s3.wav"));
    }

    #[test]
    fn test_disabled_schema_accepts_anything() {
        let parser = parser(&[]);
        assert!(parser.parse("whatever_name_here.wav").unwrap().is_empty());
        assert!(parser.check_batch(&[PathBuf::from("a_b_c.wav")]).is_ok());
    }

    #[test]
    fn test_realign_pads_truncates_and_is_idempotent() {
        let mut schema = MetadataSchema::new('_', ["speaker", "gender"]);
        schema.realign(4);
        assert_eq!(schema.fields, vec!["speaker", "gender", "field_3", "field_4"]);
        let once = schema.clone();
        schema.realign(4);
        assert_eq!(schema, once);
        schema.realign(1);
        assert_eq!(schema.fields, vec!["speaker"]);
    }

    #[test]
    fn test_with_separator_keeps_confirmed_names() {
        let schema = MetadataSchema::new('_', ["speaker", "-"]);
        let schema = schema.with_separator('-', "spk01-f-read-03.wav");
        assert_eq!(schema.separator, '-');
        assert_eq!(schema.fields, vec!["speaker", "-", "field_3", "field_4"]);
        let again = schema.clone().with_separator('-', "spk01-f-read-03.wav");
        assert_eq!(again, schema);
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        assert!(MetadataSchema::new('_', ["a", "-", "-", "b"]).validate().is_ok());
        assert!(MetadataSchema::new('_', ["a", "a"]).validate().is_err());
        assert!(MetadataSchema::new('_', ["a", " "]).validate().is_err());
    }

    #[test]
    fn test_schema_json() {
        let schema: MetadataSchema =
            serde_json::from_str(r#"{"separator": "-", "fields": ["speaker", "-"]}"#).unwrap();
        assert_eq!(schema.separator, '-');
        assert_eq!(schema.columns(), vec!["speaker"]);
        let default: MetadataSchema = serde_json::from_str("{}").unwrap();
        assert_eq!(default.separator, '_');
        assert!(!default.is_enabled());
    }
}
