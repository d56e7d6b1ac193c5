//! Extract one lab report and print the result as JSON on stdout.
//!
//! ```bash
//! scan_report report.pdf --pretty
//! RUST_LOG=debug scan_report samples.xlsx --no-cloud
//! ```

use clap::Parser;
use lab_report_scanner_lib::{extract_from_file, ExtractorConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scan_report")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Extract soil/leaf lab results from a report file", long_about = None)]
struct Cli {
    /// Report to scan (.png .jpg .jpeg .pdf .csv .txt .tsv .xlsx .xls)
    file: PathBuf,

    /// Skip Document AI and go straight to local OCR
    #[arg(long)]
    no_cloud: bool,

    /// Path to the tesseract binary
    #[arg(long)]
    tesseract_path: Option<String>,

    /// Document AI request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ExtractorConfig::from_env();
    if cli.no_cloud {
        config = config.without_cloud();
    }
    if let Some(path) = cli.tesseract_path {
        config.tesseract.path = path;
    }
    if let (Some(secs), Some(cloud)) = (cli.timeout_secs, config.document_ai.as_mut()) {
        cloud.timeout_secs = secs;
    }

    let result = extract_from_file(&cli.file, &config);
    let json = if cli.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    };
    match json {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Could not serialize result: {}", e);
            return ExitCode::FAILURE;
        }
    }
    if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
