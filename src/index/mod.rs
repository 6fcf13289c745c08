//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait covers the handful of operations ingestion needs
//! from a managed vector index: check which indexes exist, create one, look
//! one up, and upsert vectors into it. Backends:
//!
//! | Backend | Purpose |
//! |---------|---------|
//! | [`PineconeIndex`] | Managed index service over HTTP |
//! | [`InMemoryIndex`] | Process-local index for tests |

pub mod memory;
pub mod pinecone;

pub use memory::InMemoryIndex;
pub use pinecone::PineconeIndex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::VectorRecord;

/// Distance metric an index is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    Euclidean,
    Dotproduct,
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" => Ok(Metric::Euclidean),
            "dotproduct" => Ok(Metric::Dotproduct),
            other => bail!(
                "Unknown index metric: '{}'. Must be cosine, euclidean, or dotproduct.",
                other
            ),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::Dotproduct => "dotproduct",
        };
        f.write_str(name)
    }
}

/// Everything needed to create an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub cloud: String,
    /// Region / environment string supplied by the caller.
    pub region: Option<String>,
}

/// What the index service reports about an existing index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: usize,
    pub metric: Metric,
    pub host: Option<String>,
    pub ready: bool,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Names of all indexes visible to this client.
    async fn list_indexes(&self) -> Result<Vec<String>>;

    /// Looks up one index by name; `None` when it does not exist.
    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>>;

    /// Creates an index. Returns once the index accepts writes.
    async fn create_index(&self, spec: &IndexSpec) -> Result<IndexDescription>;

    /// Inserts or overwrites `records` by id. Returns the upserted count.
    async fn upsert(&self, index: &str, namespace: &str, records: &[VectorRecord])
        -> Result<usize>;

    /// Blocks until `name` accepts writes. Backends whose indexes are ready
    /// as soon as they exist only look the index up.
    async fn wait_until_ready(&self, name: &str) -> Result<IndexDescription> {
        self.describe_index(name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Index '{}' not found", name))
    }
}

/// Creates the index described by `spec` unless one with that name exists.
/// The returned flag is `true` when the index was created by this call.
///
/// Fails when an existing index has a different dimension, since every
/// upsert into it would be rejected.
pub async fn ensure_index(
    index: &dyn VectorIndex,
    spec: &IndexSpec,
) -> Result<(IndexDescription, bool)> {
    let existing = index.list_indexes().await?;
    let exists = existing.iter().any(|name| name == &spec.name);

    let description = if exists {
        let description = index
            .describe_index(&spec.name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Index '{}' was listed but not found", spec.name))?;
        if description.ready {
            description
        } else {
            tracing::info!(index = %spec.name, "waiting for index to become ready");
            index.wait_until_ready(&spec.name).await?
        }
    } else {
        tracing::info!(
            index = %spec.name,
            dimension = spec.dimension,
            metric = %spec.metric,
            "creating index"
        );
        index.create_index(spec).await?
    };

    if description.dimension != spec.dimension {
        bail!(
            "Index '{}' has dimension {} but embeddings have dimension {}",
            description.name,
            description.dimension,
            spec.dimension
        );
    }

    Ok((description, !exists))
}
