use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::import::import_package;
use crate::load_config::load_config;
use crate::store::MemoryStore;

/// CLI for scorm-import: convert SCORM packages into lessons and attachments.
#[derive(Parser)]
#[clap(
    name = "scorm-import",
    version,
    about = "Extract a SCORM package and convert its HTML content to Markdown lessons"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import a package archive into a course, printing the summary as JSON
    Import {
        /// Path to the package archive (.zip, .scorm, .pif)
        #[clap(long)]
        archive: PathBuf,
        /// Course the lessons are created under
        #[clap(long)]
        course_id: i64,
        /// Optional path to a YAML config file
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Import {
            archive,
            course_id,
            config,
        } => {
            let config = match config {
                Some(path) => load_config(path)?,
                None => {
                    let config = Config::default();
                    config.trace_loaded();
                    config
                }
            };

            let bytes = std::fs::read(&archive)?;
            let file_name = archive
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let store = MemoryStore::new();
            println!("Import starting...");
            match import_package(&bytes, &file_name, course_id, &store, &config).await {
                Ok(summary) => {
                    println!("Import complete.\nSummary:");
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("[ERROR] Import failed: {e}");
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}
