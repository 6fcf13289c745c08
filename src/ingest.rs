//! Ingestion pipeline orchestration.
//!
//! Runs directory → raw documents → windows → chunks → vectors → index.
//! Each stage finishes before the next starts.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::formatter::format_chunks;
use crate::index::{PineconeIndex, VectorIndex};
use crate::loader::{scan_documents, LoadOptions};
use crate::models::{Chunk, ChunkInput};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress};
use crate::splitter::RecursiveSplitter;
use crate::store::{embed_and_store_with_progress, StoreSettings};

/// Command-line overrides for a single run.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub docs_dir: Option<PathBuf>,
    pub index_name: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub skipped_files: usize,
    pub windows: usize,
    pub chunks: usize,
    pub dropped: usize,
    pub upserted: usize,
}

/// Output of the load/split/format stages.
#[derive(Debug, Default)]
pub struct Prepared {
    pub chunks: Vec<Chunk>,
    pub report: IngestReport,
}

/// Applies per-run overrides on top of the loaded config.
pub fn apply_overrides(config: &Config, options: &IngestOptions) -> Config {
    let mut config = config.clone();
    if let Some(dir) = &options.docs_dir {
        config.documents.dir = dir.clone();
    }
    if let Some(name) = &options.index_name {
        config.index.name = name.clone();
    }
    config
}

/// Loads, splits, and formats everything under `dir`.
pub fn prepare_chunks(
    config: &Config,
    dir: &Path,
    progress: &dyn IngestProgressReporter,
) -> Result<Prepared> {
    progress.report(IngestProgressEvent::Loading {
        dir: dir.display().to_string(),
    });
    let loaded = scan_documents(dir, &LoadOptions::from(&config.documents))?;

    let splitter =
        RecursiveSplitter::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
    let windows = splitter.split_documents(&loaded.documents);
    let chunks = format_chunks(&windows, config.chunking.min_chunk_length);

    progress.report(IngestProgressEvent::Chunked {
        documents: loaded.documents.len() as u64,
        chunks: chunks.len() as u64,
    });
    tracing::info!(
        documents = loaded.documents.len(),
        windows = windows.len(),
        chunks = chunks.len(),
        "split documents"
    );

    let report = IngestReport {
        documents: loaded.documents.len(),
        skipped_files: loaded.skipped.len(),
        windows: windows.len(),
        chunks: chunks.len(),
        dropped: windows.len() - chunks.len(),
        upserted: 0,
    };
    Ok(Prepared { chunks, report })
}

/// Runs the full pipeline with the configured provider and index service.
pub async fn run_ingest(
    config: &Config,
    options: &IngestOptions,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    let config = apply_overrides(config, options);
    config.validate()?;

    let prepared = prepare_chunks(&config, &config.documents.dir, progress)?;
    if options.dry_run {
        report_empty(&config, &prepared);
        print_summary(&config, &prepared.report, true);
        return Ok(prepared.report);
    }
    if report_empty(&config, &prepared) {
        return Ok(prepared.report);
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let index = PineconeIndex::from_config(&config.index)?;
    store_prepared(&config, prepared, provider.as_ref(), &index, progress).await
}

/// Runs the full pipeline against caller-supplied backends.
pub async fn run_ingest_with(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    let prepared = prepare_chunks(config, &config.documents.dir, progress)?;
    if report_empty(config, &prepared) {
        return Ok(prepared.report);
    }
    store_prepared(config, prepared, provider, index, progress).await
}

/// Prints why nothing will be stored. Returns `true` when there is nothing
/// to embed.
fn report_empty(config: &Config, prepared: &Prepared) -> bool {
    if prepared.report.documents == 0 {
        println!("No documents found in {}", config.documents.dir.display());
        return true;
    }
    if prepared.chunks.is_empty() {
        println!(
            "No chunks produced (min_chunk_length = {})",
            config.chunking.min_chunk_length
        );
        return true;
    }
    false
}

async fn store_prepared(
    config: &Config,
    prepared: Prepared,
    provider: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    progress: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    let mut report = prepared.report;
    let settings = StoreSettings::from_config(config)?;
    let inputs: Vec<ChunkInput> = prepared.chunks.into_iter().map(ChunkInput::from).collect();
    let stored =
        embed_and_store_with_progress(&inputs, provider, index, &settings, progress).await?;
    report.upserted = stored.upserted;

    print_summary(config, &report, false);
    Ok(report)
}

/// Convenience for library callers that don't want progress output.
pub async fn run_ingest_quiet(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
) -> Result<IngestReport> {
    run_ingest_with(config, provider, index, &NoProgress).await
}

fn print_summary(config: &Config, report: &IngestReport, dry_run: bool) {
    if dry_run {
        println!("ingest {} (dry-run)", config.documents.dir.display());
    } else {
        println!("ingest {}", config.documents.dir.display());
    }
    println!("  documents loaded: {}", report.documents);
    println!("  files skipped: {}", report.skipped_files);
    println!("  windows: {}", report.windows);
    println!("  chunks: {}", report.chunks);
    println!("  dropped (< {} chars): {}", config.chunking.min_chunk_length, report.dropped);
    if !dry_run {
        println!("  vectors upserted: {}", report.upserted);
        println!("  index: {}", config.index.name);
    }
    println!("ok");
}
