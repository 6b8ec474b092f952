use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sheetmap_core::{
    DateFormatRegistry, SheetMapConfig, Validation, WorkbookReader, WorkbookWriter,
};
use std::fs::File;
use std::path::PathBuf;

mod formatter;
mod logging;

#[derive(Parser)]
#[command(name = "sheetmap")]
#[command(
    about = "Read XLSX/XLS/ODS workbooks as plain text and write them back as XLSX",
    long_about = "Read XLSX/XLS/ODS workbooks as plain text and write them back as XLSX.\n\nDate cells are rendered from their native number format, which XLS files do not expose; XLS dates read as the error marker."
)]
#[command(version)]
struct Cli {
    /// Path to the Excel/ODS file to read
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormat,

    /// Write the (possibly annotated) workbook to this XLSX file
    #[arg(short, long, value_name = "OUT")]
    output: Option<PathBuf>,

    /// Attach validation failures to their cells as comments
    #[arg(short, long)]
    annotate: bool,

    /// Log progress to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable colored summary
    Human,
    /// The full model and validation result as JSON
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Load configuration
    let config = if let Some(config_path) = &cli.config {
        SheetMapConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?
    } else {
        // Try to load default config from current directory if it exists
        let default_config_path = PathBuf::from("sheetmap.toml");
        if default_config_path.exists() {
            SheetMapConfig::from_file(&default_config_path).with_context(|| {
                format!(
                    "Failed to load config from {}",
                    default_config_path.display()
                )
            })?
        } else {
            SheetMapConfig::default()
        }
    };

    let registry = DateFormatRegistry::from_config(&config).context("Invalid date formats")?;

    let file = File::open(&cli.file)
        .with_context(|| format!("Failed to open file: {}", cli.file.display()))?;
    let mut workbook = WorkbookReader::new(&registry)
        .read(file)
        .with_context(|| format!("Failed to read file: {}", cli.file.display()))?;

    let outcome = Validation::builtin().run(&workbook);

    if cli.annotate {
        Validation::annotate(&mut workbook, outcome.failures())
            .context("Failed to annotate workbook")?;
    }

    match cli.format {
        OutputFormat::Human => {
            formatter::print_human(&cli.file, &workbook, &outcome);
        }
        OutputFormat::Json => {
            formatter::print_json(&cli.file, &workbook, &outcome)?;
        }
    }

    if let Some(output) = &cli.output {
        WorkbookWriter::from_config(&config)
            .write_file(&workbook, output)
            .with_context(|| format!("Failed to write file: {}", output.display()))?;
    }

    std::process::exit(if outcome.passed() { 0 } else { 1 });
}
