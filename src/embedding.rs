//! Embedding provider abstraction.
//!
//! - **[`LocalProvider`]** runs a pretrained sentence-embedding model in
//!   process via fastembed. The default is `all-MiniLM-L6-v2` (384 dims).
//!   The model is downloaded from Hugging Face on first use and cached.
//! - **[`DisabledProvider`]** fails every call; selected by
//!   `embedding.provider = "disabled"`.
//!
//! ```rust,no_run
//! # use doc_ingest::config::EmbeddingConfig;
//! # use doc_ingest::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "local"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.dims(), 384);
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::EmbeddingConfig;

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embeds a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed `texts` in batches of `batch_size`, preserving order.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let embedded = provider.embed(batch).await?;
        if embedded.len() != batch.len() {
            bail!(
                "Embedding provider returned {} vectors for {} texts",
                embedded.len(),
                batch.len()
            );
        }
        tracing::debug!(
            done = vectors.len() + embedded.len(),
            total = texts.len(),
            "embedded batch"
        );
        vectors.extend(embedded);
    }
    Ok(vectors)
}

// ============ Disabled Provider ============

pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Local Provider (fastembed) ============

/// Maps a configured model name to its native dimensionality.
///
/// Accepts the Hugging Face repository id as well as the short name.
pub fn known_model_dims(name: &str) -> Option<usize> {
    match canonical_model_name(name) {
        "all-minilm-l6-v2" => Some(384),
        "bge-small-en-v1.5" => Some(384),
        "bge-base-en-v1.5" => Some(768),
        "bge-large-en-v1.5" => Some(1024),
        "multilingual-e5-small" => Some(384),
        "multilingual-e5-base" => Some(768),
        "multilingual-e5-large" => Some(1024),
        _ => None,
    }
}

fn canonical_model_name(name: &str) -> &str {
    match name {
        "sentence-transformers/all-MiniLM-L6-v2" | "all-MiniLM-L6-v2" => "all-minilm-l6-v2",
        "BAAI/bge-small-en-v1.5" => "bge-small-en-v1.5",
        "BAAI/bge-base-en-v1.5" => "bge-base-en-v1.5",
        "BAAI/bge-large-en-v1.5" => "bge-large-en-v1.5",
        other => other,
    }
}

/// Local in-process embedding. The underlying model is created lazily on
/// the first [`embed`](EmbeddingProvider::embed) call and reused after.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: std::sync::Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = canonical_model_name(&config.model).to_string();
        // Fail on unknown names before any download happens.
        config_to_fastembed_model(&model_name)?;

        if let Some(native) = known_model_dims(&model_name) {
            if native != config.dims {
                bail!(
                    "embedding.dims is {} but model '{}' produces {}-dimensional vectors",
                    config.dims,
                    model_name,
                    native
                );
            }
        }

        Ok(Self {
            model_name,
            dims: config.dims,
            batch_size: config.batch_size,
            model: std::sync::Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let fastembed_model = config_to_fastembed_model(&self.model_name)?;
        let slot = std::sync::Arc::clone(&self.model);
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = slot
                .lock()
                .map_err(|_| anyhow::anyhow!("local embedding model lock poisoned"))?;

            if guard.is_none() {
                tracing::info!(model = ?fastembed_model, "loading local embedding model");
                let model = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
                )
                .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;
                *guard = Some(model);
            }

            let model = guard
                .as_mut()
                .ok_or_else(|| anyhow::anyhow!("local embedding model not initialized"))?;
            let embeddings = model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))?;

            Ok::<_, anyhow::Error>(embeddings)
        })
        .await?
    }
}

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"local"` | `LocalProvider` (requires `local-embeddings-fastembed`) |
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Box::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingProvider {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[test]
    fn known_dims_accepts_repo_ids() {
        assert_eq!(
            known_model_dims("sentence-transformers/all-MiniLM-L6-v2"),
            Some(384)
        );
        assert_eq!(known_model_dims("all-minilm-l6-v2"), Some(384));
        assert_eq!(known_model_dims("bge-large-en-v1.5"), Some(1024));
        assert_eq!(known_model_dims("mystery"), None);
    }

    #[tokio::test]
    async fn disabled_provider_errors() {
        let err = DisabledProvider
            .embed(&["x".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[tokio::test]
    async fn batches_preserve_order() {
        let provider = CountingProvider {
            calls: std::sync::atomic::AtomicUsize::new(0),
        };
        let texts: Vec<String> = (1..=5).map(|n| "a".repeat(n)).collect();
        let vectors = embed_in_batches(&provider, &texts, 2).await.unwrap();
        assert_eq!(vectors.len(), 5);
        assert_eq!(vectors[4][0], 5.0);
        assert_eq!(
            provider.calls.load(std::sync::atomic::Ordering::SeqCst),
            3
        );
    }

    #[cfg(feature = "local-embeddings-fastembed")]
    #[test]
    fn local_provider_rejects_wrong_dims() {
        let config = EmbeddingConfig {
            dims: 768,
            ..EmbeddingConfig::default()
        };
        assert!(LocalProvider::new(&config).is_err());
    }

    #[cfg(feature = "local-embeddings-fastembed")]
    #[test]
    fn local_provider_accepts_repo_id() {
        let config = EmbeddingConfig {
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            ..EmbeddingConfig::default()
        };
        let provider = LocalProvider::new(&config).unwrap();
        assert_eq!(provider.model_name(), "all-minilm-l6-v2");
        assert_eq!(provider.dims(), 384);
    }
}
