//! BBL Validator CLI - Validate CSV files against registered CSV Schemas
//!
//! # Commands
//!
//! ```bash
//! bbl-validator serve                               # Start HTTP server (port 8080)
//! bbl-validator schemas                             # List registered schemas
//! bbl-validator validate concat --file input.csv    # Validate a local file
//! bbl-validator validate concat --url https://...   # Validate a remote file
//! ```
//!
//! Settings come from `BBL_*` environment variables (see `config`);
//! flags override them.

use bbl_validator::{InputSource, SchemaRegistry, Settings, TempResourceManager, Validator};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bbl-validator")]
#[command(about = "Validate CSV files against registered CSV Schemas", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory holding schema metadata and documents
        #[arg(short, long)]
        schema_dir: Option<PathBuf>,
    },

    /// List registered schemas
    Schemas {
        /// Directory holding schema metadata and documents
        #[arg(short, long)]
        schema_dir: Option<PathBuf>,
    },

    /// Validate a CSV file once and print the outcome
    Validate {
        /// Schema ID
        schema_id: String,

        /// Local CSV file
        #[arg(short, long, conflicts_with = "url", required_unless_present = "url")]
        file: Option<PathBuf>,

        /// Remote CSV URL
        #[arg(short, long)]
        url: Option<String>,

        /// Directory holding schema metadata and documents
        #[arg(short, long)]
        schema_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match Settings::from_env() {
        Ok(settings) => match cli.command {
            Commands::Serve { port, schema_dir } => {
                cmd_serve(with_overrides(settings, port, schema_dir)).await
            }

            Commands::Schemas { schema_dir } => {
                cmd_schemas(with_overrides(settings, None, schema_dir))
            }

            Commands::Validate {
                schema_id,
                file,
                url,
                schema_dir,
            } => {
                let input: Result<InputSource, Box<dyn std::error::Error>> = match (file, url) {
                    (Some(path), _) => std::fs::read(&path)
                        .map(InputSource::Content)
                        .map_err(|e| format!("Cannot read {}: {}", path.display(), e).into()),
                    (None, Some(url)) => Ok(InputSource::Url(url)),
                    (None, None) => Err("Either --file or --url is required".into()),
                };
                match input {
                    Ok(input) => {
                        cmd_validate(with_overrides(settings, None, schema_dir), &schema_id, input)
                            .await
                    }
                    Err(e) => Err(e),
                }
            }
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn with_overrides(mut settings: Settings, port: Option<u16>, schema_dir: Option<PathBuf>) -> Settings {
    if let Some(port) = port {
        settings.port = port;
    }
    if let Some(dir) = schema_dir {
        settings.schema_dir = dir;
    }
    settings
}

async fn cmd_serve(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    bbl_validator::server::start_server(settings).await?;
    Ok(())
}

fn cmd_schemas(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let registry = SchemaRegistry::load(settings.schema_path())?;

    if registry.is_empty() {
        eprintln!("📋 No schemas in {}", registry.directory().display());
        return Ok(());
    }

    eprintln!("📋 Schemas in {} ({}):\n", registry.directory().display(), registry.len());
    for info in registry.list() {
        println!("  📄 {} ({})", info.name, info.id);
        println!("     Version: {}  Date: {}", info.version, info.date);
        if !info.description.is_empty() {
            println!("     {}", info.description);
        }
        println!();
    }

    Ok(())
}

async fn cmd_validate(
    settings: Settings,
    schema_id: &str,
    input: InputSource,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating {} against '{}'", input.describe(), schema_id);

    let validator = Validator::new(
        Arc::new(SchemaRegistry::load(settings.schema_path())?),
        Arc::new(TempResourceManager::new(
            settings.connect_timeout,
            settings.read_timeout,
        )?),
        Arc::new(settings.engine()),
    )
    .with_max_cell_length(settings.max_cell_length);

    let outcome = validator.run_validation(schema_id, input).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.passed {
        eprintln!("\n✅ Passed in {} ms", outcome.execution_time);
        Ok(())
    } else {
        eprintln!(
            "\n❌ {} failure(s) in {} ms",
            outcome.failures.len(),
            outcome.execution_time
        );
        std::process::exit(1);
    }
}
