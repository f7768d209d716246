//! GeoNER CLI - Command-line interface
//!
//! Usage:
//!   geoner run [--input DIR] [--output PATH] [--format F] [--title-case]
//!   geoner extract <file>
//!   geoner geocode <address>
//!   geoner config
//!
//! Author: hephaex@gmail.com

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use geoner_core::{AppConfig, CaseMode, LoggingConfig, OutputFormat};
use geoner_extractor::{create_recognizer, SpatialEntityExtractor};
use geoner_geocode::create_geocoder;
use geoner_parser::{DocumentParser, PlainTextParser};
use geoner_pipeline::Pipeline;

/// Exit status after Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

/// Printed in place of secrets
const REDACTED: &str = "<redacted>";

#[derive(Parser)]
#[command(name = "geoner")]
#[command(about = "Extract and geocode place names from text documents")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML); environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every document in a directory
    Run {
        /// Input directory
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output file (.gpkg or .geojson)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Output format: console, geojson, geopackage
        #[arg(short, long)]
        format: Option<String>,
        /// Title-case document text before recognition
        #[arg(long)]
        title_case: bool,
    },
    /// Print every entity record found in one file
    Extract {
        /// Document to read
        file: PathBuf,
    },
    /// Look up one address
    Geocode {
        /// Free-text address
        address: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

/// Apply `run` flags on top of file and environment settings
fn apply_run_overrides(
    config: &mut AppConfig,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    format: Option<&str>,
    title_case: bool,
) -> anyhow::Result<()> {
    if let Some(input) = input {
        config.input.directory = input;
    }

    if let Some(output) = output {
        if format.is_none() {
            config.output.format = OutputFormat::infer_from_path(&output).with_context(|| {
                format!("Cannot infer output format from {}", output.display())
            })?;
        }
        config.output.path = Some(output);
    }

    if let Some(format) = format {
        config.output.format = format.parse()?;
    }

    if title_case {
        config.input.case_mode = CaseMode::Title;
    }

    Ok(())
}

/// Copy of `config` safe to print; the geocoder token is masked
fn redacted(mut config: AppConfig) -> AppConfig {
    if config.geocoder.token.is_some() {
        config.geocoder.token = Some(REDACTED.to_string());
    }
    config
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn execute(command: Commands, mut config: AppConfig) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            input,
            output,
            format,
            title_case,
        } => {
            apply_run_overrides(&mut config, input, output, format.as_deref(), title_case)?;

            let mut pipeline = Pipeline::from_config(&config).await?;
            let report = pipeline.run().await?;
            eprintln!("{report}");
        }
        Commands::Extract { file } => {
            let document = PlainTextParser
                .parse(&file)?
                .normalize(config.input.case_mode);

            let extractor = SpatialEntityExtractor::new(
                create_recognizer(&config.ner)?,
                create_geocoder(&config.geocoder)?,
            )
            .with_excluded_labels(&config.ner.excluded_labels)
            .with_context_width(config.output.context_width);

            let extraction = extractor
                .extract(&document.name, &document.content)
                .await?;
            println!("{}", serde_json::to_string_pretty(&extraction.records)?);
        }
        Commands::Geocode { address } => {
            let geocoder = create_geocoder(&config.geocoder)?;
            match geocoder.geocode(&address).await? {
                Some(point) => println!("{address}\t{point}"),
                None => println!("{address}\tno candidates"),
            }
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&redacted(config))?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging);

    tokio::select! {
        result = execute(cli.command, config) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted by user");
            eprintln!("Interrupted");
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}
