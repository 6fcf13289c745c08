//! Embed chunks and upsert them into a vector index.
//!
//! Record ids are `doc_{ordinal}` over the input slice. They are unrelated
//! to `chunk_id` and shift whenever the input set changes, so re-ingesting a
//! changed directory overwrites by position, not by content.

use anyhow::{bail, Result};
use serde_json::Value;

use crate::config::Config;
use crate::embedding::{embed_in_batches, EmbeddingProvider};
use crate::index::{ensure_index, IndexSpec, VectorIndex};
use crate::models::{ChunkInput, Metadata, VectorRecord};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, NoProgress};

/// Metadata key holding the chunk text alongside its vector.
pub const TEXT_KEY: &str = "text";

/// Knobs for [`embed_and_store`], usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub index: IndexSpec,
    pub namespace: String,
    pub embed_batch_size: usize,
    pub upsert_batch_size: usize,
}

impl StoreSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            index: IndexSpec {
                name: config.index.name.clone(),
                dimension: config.index.dimension,
                metric: config.index.metric()?,
                cloud: config.index.cloud.clone(),
                region: config.index.resolved_environment(),
            },
            namespace: config.index.namespace.clone(),
            embed_batch_size: config.embedding.batch_size,
            upsert_batch_size: config.index.upsert_batch_size,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreReport {
    pub embedded: usize,
    /// Records sent to the index.
    pub sent: usize,
    /// Sum of the counts the index reported back.
    pub upserted: usize,
    pub index_created: bool,
}

/// Builds the id and metadata for every input, in order.
///
/// Record inputs keep their metadata and gain `chunk_id`; bare strings get
/// `source: "unknown"` and their ordinal as `chunk_id`. Both carry the text
/// under [`TEXT_KEY`].
pub fn record_metadata(inputs: &[ChunkInput]) -> Vec<(String, Metadata)> {
    inputs
        .iter()
        .enumerate()
        .map(|(i, input)| {
            let mut metadata = match input {
                ChunkInput::Record(chunk) => {
                    let mut metadata = chunk.metadata.clone();
                    metadata.insert(
                        "chunk_id".to_string(),
                        Value::String(chunk.chunk_id.clone()),
                    );
                    metadata
                }
                ChunkInput::Text(_) => {
                    let mut metadata = Metadata::new();
                    metadata.insert("source".to_string(), Value::String("unknown".to_string()));
                    metadata.insert("chunk_id".to_string(), Value::String(i.to_string()));
                    metadata
                }
            };
            metadata.insert(
                TEXT_KEY.to_string(),
                Value::String(input.text().to_string()),
            );
            (format!("doc_{}", i), metadata)
        })
        .collect()
}

/// Embeds `inputs` and upserts them into the index named in `settings`,
/// creating the index first if it does not exist.
pub async fn embed_and_store(
    inputs: &[ChunkInput],
    provider: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    settings: &StoreSettings,
) -> Result<StoreReport> {
    embed_and_store_with_progress(inputs, provider, index, settings, &NoProgress).await
}

pub async fn embed_and_store_with_progress(
    inputs: &[ChunkInput],
    provider: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    settings: &StoreSettings,
    progress: &dyn IngestProgressReporter,
) -> Result<StoreReport> {
    if inputs.is_empty() {
        return Ok(StoreReport::default());
    }

    let (description, index_created) = ensure_index(index, &settings.index).await?;

    let texts: Vec<String> = inputs.iter().map(|i| i.text().to_string()).collect();

    println!("Generating embeddings for {} chunks...", texts.len());
    tracing::info!(
        chunks = texts.len(),
        model = provider.model_name(),
        "generating embeddings"
    );
    progress.report(IngestProgressEvent::Embedding {
        n: 0,
        total: texts.len() as u64,
    });
    let vectors = embed_in_batches(provider, &texts, settings.embed_batch_size).await?;
    progress.report(IngestProgressEvent::Embedding {
        n: vectors.len() as u64,
        total: texts.len() as u64,
    });

    if let Some((pos, bad)) = vectors
        .iter()
        .enumerate()
        .find(|(_, v)| v.len() != description.dimension)
    {
        bail!(
            "Embedding for doc_{} has {} dimensions but index '{}' expects {}",
            pos,
            bad.len(),
            description.name,
            description.dimension
        );
    }

    let records: Vec<VectorRecord> = record_metadata(inputs)
        .into_iter()
        .zip(vectors)
        .map(|((id, metadata), values)| VectorRecord {
            id,
            values,
            metadata,
        })
        .collect();

    let mut sent = 0usize;
    let mut upserted = 0usize;
    for batch in records.chunks(settings.upsert_batch_size.max(1)) {
        let reported = index
            .upsert(&description.name, &settings.namespace, batch)
            .await?;
        if reported != batch.len() {
            tracing::warn!(
                index = %description.name,
                sent = batch.len(),
                reported,
                "index reported a different upsert count"
            );
        }
        sent += batch.len();
        upserted += reported;
        tracing::debug!(sent, total = records.len(), "upserted batch");
        progress.report(IngestProgressEvent::Upserting {
            n: sent as u64,
            total: records.len() as u64,
        });
    }

    println!("Stored {} chunks in index '{}'", sent, description.name);

    Ok(StoreReport {
        embedded: records.len(),
        sent,
        upserted,
        index_created,
    })
}
