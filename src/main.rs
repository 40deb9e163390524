use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use resource_graph::config::AppConfig;
use resource_graph::logic::{CidResolver, Payload};
use resource_graph::model::RecordGraph;
use resource_graph::seed;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "resource-graph", version, about = "JSON-API graph codec and correlation id resolver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Print the nested records of a JSON-API document
    Export {
        /// JSON-API document
        file: PathBuf,
    },
    /// Print the relation paths expanded in a JSON-API document
    Embedded {
        /// JSON-API document
        file: PathBuf,
    },
    /// Resolve correlation values against the seeded gallery store
    Resolve {
        /// JSON array of records
        file: PathBuf,
        /// Resource type of the top-level records, e.g. "Image"
        root: String,
    },
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let cli = Cli::parse();

    let config = AppConfig::load()?;
    log::debug!("configuration loaded: {:?}", config);

    match cli.command {
        Command::Export { file } => {
            let payload = Payload::from_config(&config).decode(&read(&file)?)?;
            let exported = payload.export(None)?;
            println!("{}", serde_json::to_string_pretty(&exported)?);
        }
        Command::Embedded { file } => {
            let payload = Payload::from_config(&config).decode(&read(&file)?)?;
            for path in payload.embedded() {
                println!("{}", path);
            }
        }
        Command::Resolve { file, root } => {
            let records: RecordGraph = serde_json::from_slice(&read(&file)?)
                .context("Expected a JSON array of records")?;
            let schema = seed::gallery_schema();
            let store = seed::gallery_store();

            let resolution = CidResolver::new(&schema, &store).resolve(&records, &root)?;
            log::info!(
                "resolved {} record(s) with {} lookup(s)",
                resolution.records.len(),
                store.lookup_count()
            );
            println!("{}", serde_json::to_string_pretty(&resolution)?);
        }
    }

    Ok(())
}
