//! # Document ingestion CLI (`ingest`)
//!
//! Loads a documents directory, splits and filters it into chunks, embeds
//! the chunks, and upserts the vectors into a managed vector index.
//!
//! ## Usage
//!
//! ```bash
//! ingest --config ./config/ingest.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ingest init` | Scaffold `config/ingest.toml`, `.env.example` and `docs/` |
//! | `ingest load` | List the documents that would be loaded and the files skipped |
//! | `ingest run` | Load, split, embed and upsert |
//!
//! The index API key is read from `PINECONE_API_KEY`, and a `.env` file in
//! the working directory is loaded first if present. Log verbosity follows
//! `RUST_LOG` (default `info`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use doc_ingest::config::{self, Config};
use doc_ingest::ingest::{run_ingest, IngestOptions};
use doc_ingest::loader::{scan_documents, LoadOptions};
use doc_ingest::progress::ProgressMode;
use doc_ingest::scaffold::{scaffold_project, ScaffoldStatus};

#[derive(Parser)]
#[command(
    name = "ingest",
    about = "Load documents, chunk them, embed them and upsert them into a vector index",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/ingest.toml`. When the flag is omitted and that
    /// file does not exist, built-in defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold project files. Existing files are left untouched.
    Init {
        /// Project root to scaffold into.
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Run the full pipeline: load, split, format, embed, upsert.
    Run {
        /// Documents directory (overrides `documents.dir`).
        #[arg(long)]
        docs: Option<PathBuf>,

        /// Index name (overrides `index.name`).
        #[arg(long)]
        index: Option<String>,

        /// Stop after chunking and print counts. Needs no API key.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr. Defaults to `human` on a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// List loaded documents and skipped files.
    Load {
        /// Documents directory (overrides `documents.dir`).
        #[arg(long)]
        docs: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Init runs before any config exists.
    if let Commands::Init { root } = &cli.command {
        let entries = scaffold_project(root)?;
        for entry in entries {
            let status = match entry.status {
                ScaffoldStatus::Created => "created",
                ScaffoldStatus::AlreadyExists => "exists",
            };
            println!("  {:<8} {}", status, entry.path.display());
        }
        println!("ok");
        return Ok(());
    }

    let cfg = resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Run {
            docs,
            index,
            dry_run,
            progress,
        } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let reporter = mode.reporter();
            let options = IngestOptions {
                docs_dir: docs,
                index_name: index,
                dry_run,
            };
            run_ingest(&cfg, &options, reporter.as_ref()).await?;
        }
        Commands::Load { docs } => {
            let dir = docs.unwrap_or_else(|| cfg.documents.dir.clone());
            let report = scan_documents(&dir, &LoadOptions::from(&cfg.documents))?;
            if report.documents.is_empty() {
                println!("No documents found in {}", dir.display());
            }
            for doc in &report.documents {
                println!(
                    "  {}  ({} chars)",
                    doc.source().unwrap_or("?"),
                    doc.char_len()
                );
            }
            for skipped in &report.skipped {
                println!("  skipped {}: {:?}", skipped.path.display(), skipped.reason);
            }
            println!(
                "{} documents, {} skipped",
                report.documents.len(),
                report.skipped.len()
            );
        }
    }

    Ok(())
}

const DEFAULT_CONFIG_PATH: &str = "./config/ingest.toml";

/// Loads the config file. Without `--config`, a missing default file means
/// built-in defaults.
fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        return config::load_config(path);
    }
    let path = Path::new(DEFAULT_CONFIG_PATH);
    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        let cfg = Config::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    config::load_config(path)
}
