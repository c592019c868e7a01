use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use acoustic_atlas::analysis::{FeatureFamily, FeatureSpec};
use acoustic_atlas::logging;
use acoustic_atlas::metadata::{FilenameMetadataParser, MetadataSchema};
use acoustic_atlas::pipeline::{ExtractionOrchestrator, InputSource};
use acoustic_atlas::projector::{ColumnRoles, ProjectorExport, VisualizationSink};
use acoustic_atlas::PipelineConfig;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("acoustic_atlas error: {err:?}");
            ExitCode::from(1)
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "acoustic_atlas",
    about = "Acoustic feature tables for speech corpora"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn execute(self) -> Result<()> {
        match self.command {
            Command::Extract(args) => extract_command(args),
            Command::InspectFilename(args) => inspect_filename_command(args),
            Command::Families => families_command(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a feature table from a directory or a list of files.
    Extract(ExtractArgs),
    /// Show how a filename splits under a separator and field list.
    InspectFilename(InspectArgs),
    /// Print every feature family with its default parameters as JSON.
    Families,
}

#[derive(Args, Debug, Clone)]
struct ExtractArgs {
    /// One directory, or one or more audio files.
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,
    /// JSON configuration file; flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Destination of the delimited table (stdout when omitted).
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Feature families to extract, comma separated (e.g. mel,prosody).
    #[arg(long, value_delimiter = ',')]
    features: Vec<FeatureFamily>,
    /// Field delimiter of the table.
    #[arg(long)]
    delimiter: Option<char>,
    /// Worker threads.
    #[arg(long)]
    workers: Option<usize>,
    /// Analysis sample rate in Hz.
    #[arg(long)]
    sample_rate: Option<u32>,
    /// Filename fields, comma separated; `-` skips a token.
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
    /// Filename token separator.
    #[arg(long)]
    separator: Option<char>,
    /// Do not append the projector `selection` column.
    #[arg(long)]
    no_selection: bool,
    /// Also write embedding-projector TSV files into this directory.
    #[arg(long)]
    projector_dir: Option<PathBuf>,
    /// Write the run report as JSON to this file.
    #[arg(long)]
    report: Option<PathBuf>,
}

impl ExtractArgs {
    fn build_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load_from_file(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if !self.features.is_empty() {
            // keep configured parameters for families that stay selected
            config.features = self
                .features
                .iter()
                .map(|family| {
                    config
                        .features
                        .iter()
                        .find(|spec| spec.family() == *family)
                        .cloned()
                        .unwrap_or_else(|| FeatureSpec::default_for(*family))
                })
                .collect();
        }
        if let Some(delimiter) = self.delimiter {
            config.output.delimiter = delimiter;
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
        if let Some(rate) = self.sample_rate {
            config.target_sample_rate = rate;
        }
        if !self.fields.is_empty() {
            config.metadata.fields = self.fields.clone();
        }
        if let Some(separator) = self.separator {
            config.metadata.separator = separator;
        }
        if self.no_selection {
            config.output.append_selection = false;
        }
        Ok(config)
    }

    fn input_source(&self) -> InputSource {
        match self.inputs.as_slice() {
            [single] if single.is_dir() => InputSource::Directory(single.clone()),
            _ => InputSource::Files(self.inputs.clone()),
        }
    }
}

fn extract_command(args: ExtractArgs) -> Result<()> {
    let config = args.build_config()?;
    let delimiter = config.output.delimiter_byte()?;
    let orchestrator = ExtractionOrchestrator::new(config);
    let extraction = orchestrator
        .run(&args.input_source())
        .context("extraction failed")?;

    match &args.output {
        Some(path) => {
            extraction
                .table
                .write_to_path(path, delimiter)
                .with_context(|| format!("writing table {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            extraction.table.write_delimited(&mut handle, delimiter)?;
            handle.flush()?;
        }
    }

    if let Some(dir) = &args.projector_dir {
        let export = ProjectorExport::new(dir);
        export
            .present(&extraction.table, &ColumnRoles::from_table(&extraction.table))
            .with_context(|| format!("exporting projector files to {}", dir.display()))?;
    }

    if let Some(path) = &args.report {
        extraction
            .report
            .write_json(path)
            .with_context(|| format!("writing report {}", path.display()))?;
    }
    Ok(())
}

#[derive(Args, Debug, Clone)]
struct InspectArgs {
    /// A filename (or path) following the corpus naming convention.
    name: String,
    /// Filename token separator.
    #[arg(long, default_value_t = '_')]
    separator: char,
    /// Field names, comma separated; missing positions get `field_<n>`.
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
}

fn inspect_filename_command(args: InspectArgs) -> Result<()> {
    let schema = MetadataSchema::new(args.separator, args.fields.iter().cloned())
        .with_separator(args.separator, &args.name);
    schema.validate().map_err(anyhow::Error::msg)?;

    let parser = FilenameMetadataParser::new(schema);
    let stem = Path::new(&args.name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tokens = parser.split(&stem);
    let record = parser.parse(&args.name)?;

    println!("tokens ({}):", tokens.len());
    for (i, (field, token)) in parser.schema().fields.iter().zip(&tokens).enumerate() {
        println!("  {:>2}  {:<16} {}", i + 1, field, token);
    }
    println!("columns: {}", record.iter().map(|(name, _)| name).collect::<Vec<_>>().join(", "));
    println!("--fields {}", parser.schema().fields.join(","));
    Ok(())
}

fn families_command() -> Result<()> {
    let defaults: Vec<FeatureSpec> = FeatureFamily::ALL
        .into_iter()
        .map(FeatureSpec::default_for)
        .collect();
    println!("{}", serde_json::to_string_pretty(&defaults)?);
    Ok(())
}
