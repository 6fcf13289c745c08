use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use tempfile::TempDir;

use doc_ingest::config::Config;
use doc_ingest::embedding::EmbeddingProvider;
use doc_ingest::index::{InMemoryIndex, Metric, IndexSpec, VectorIndex};
use doc_ingest::ingest::run_ingest_quiet;
use doc_ingest::models::ChunkInput;
use doc_ingest::store::{embed_and_store, StoreSettings};

/// Hashes bytes into a fixed-width vector. Same text, same vector.
struct HashProvider {
    dims: usize,
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; self.dims];
                for (i, b) in t.bytes().enumerate() {
                    v[i % self.dims] += b as f32 / 255.0;
                }
                v
            })
            .collect())
    }
}

fn config_for(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.documents.dir = dir.path().join("docs");
    config.index.name = "api-docs".to_string();
    config
}

fn write_docs(dir: &TempDir) {
    let docs = dir.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    let long: String = (0..120)
        .map(|i| format!("Sentence number {} describes the widgets API in detail.", i))
        .collect::<Vec<_>>()
        .join(" ");
    fs::write(docs.join("a_long.md"), &long).unwrap();
    fs::write(
        docs.join("b_page.html"),
        "<html><head><title>x</title><style>p{}</style></head><body><h1>Orders</h1>\
         <p>The orders endpoint creates, lists and cancels orders for a customer account.</p>\
         <script>var hidden = 1;</script></body></html>",
    )
    .unwrap();
    fs::write(docs.join("c_tiny.txt"), "too short").unwrap();
}

#[tokio::test]
async fn ingests_directory_into_index() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let config = config_for(&tmp);
    let index = InMemoryIndex::new();

    let report = run_ingest_quiet(&config, &HashProvider { dims: 384 }, &index)
        .await
        .unwrap();

    assert_eq!(report.documents, 3);
    assert_eq!(report.dropped, 1);
    assert!(report.windows > 3, "long doc should split: {:?}", report);
    assert_eq!(report.chunks, report.windows - 1);
    assert_eq!(report.upserted, report.chunks);

    let records = index.records("api-docs", "");
    assert_eq!(records.len(), report.chunks);
    assert!(records.iter().all(|r| r.values.len() == 384));
    assert!(records.iter().all(|r| r.id.starts_with("doc_")));

    let html = records
        .iter()
        .find(|r| r.metadata["format"] == "html")
        .expect("html chunk stored");
    let text = html.metadata["text"].as_str().unwrap();
    assert!(text.contains("orders endpoint"));
    assert!(!text.contains("hidden"));
    assert!(!text.contains("p{}"));
    assert!(html.metadata.contains_key("content_hash"));
    assert!(html.metadata.contains_key("chunk_id"));
    assert!(html.metadata["source"].as_str().unwrap().ends_with("b_page.html"));

    assert!(!records
        .iter()
        .any(|r| r.metadata["text"].as_str() == Some("too short")));
}

#[tokio::test]
async fn rerun_reproduces_ids() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let config = config_for(&tmp);
    let provider = HashProvider { dims: 384 };

    let first = InMemoryIndex::new();
    run_ingest_quiet(&config, &provider, &first).await.unwrap();
    let second = InMemoryIndex::new();
    run_ingest_quiet(&config, &provider, &second).await.unwrap();

    let key = |records: Vec<doc_ingest::models::VectorRecord>| {
        records
            .into_iter()
            .map(|r| (r.id, r.metadata["chunk_id"].clone(), r.values))
            .collect::<Vec<_>>()
    };
    assert_eq!(
        key(first.records("api-docs", "")),
        key(second.records("api-docs", ""))
    );

    // Rerunning into the same index overwrites rather than duplicates.
    let report = run_ingest_quiet(&config, &provider, &first).await.unwrap();
    assert_eq!(first.records("api-docs", "").len(), report.chunks);
    assert_eq!(first.created_count(), 1);
}

#[tokio::test]
async fn only_unknown_extensions_stores_nothing() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("table.csv"), "a,b\n1,2\n").unwrap();

    let index = InMemoryIndex::new();
    let report = run_ingest_quiet(&config_for(&tmp), &HashProvider { dims: 384 }, &index)
        .await
        .unwrap();
    assert_eq!(report.documents, 0);
    assert_eq!(report.skipped_files, 1);
    assert_eq!(report.upserted, 0);
    assert!(index.list_indexes().await.unwrap().is_empty());
}

#[tokio::test]
async fn everything_below_minimum_creates_no_index() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::write(docs.join("a.txt"), "tiny").unwrap();
    fs::write(docs.join("b.md"), "   also tiny   ").unwrap();

    let index = InMemoryIndex::new();
    let report = run_ingest_quiet(&config_for(&tmp), &HashProvider { dims: 384 }, &index)
        .await
        .unwrap();
    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, 0);
    assert_eq!(report.dropped, 2);
    assert_eq!(index.created_count(), 0);
}

#[tokio::test]
async fn bare_strings_are_stored_with_unknown_source() {
    let index = InMemoryIndex::new();
    let settings = StoreSettings {
        index: IndexSpec {
            name: "strings".to_string(),
            dimension: 384,
            metric: Metric::Cosine,
            cloud: "aws".to_string(),
            region: Some("us-east-1".to_string()),
        },
        namespace: "ns".to_string(),
        embed_batch_size: 1,
        upsert_batch_size: 1,
    };
    let inputs = vec![
        ChunkInput::from("first passage of text"),
        ChunkInput::from("second passage of text".to_string()),
    ];

    let report = embed_and_store(&inputs, &HashProvider { dims: 384 }, &index, &settings)
        .await
        .unwrap();
    assert!(report.index_created);
    assert_eq!(report.upserted, 2);

    let records = index.records("strings", "ns");
    assert_eq!(records[0].id, "doc_0");
    assert_eq!(records[1].id, "doc_1");
    assert_eq!(records[0].metadata["source"], "unknown");
    assert_eq!(records[1].metadata["chunk_id"], "1");
    assert_eq!(records[1].metadata["text"], "second passage of text");
    assert!(index.records("strings", "").is_empty());
}

#[tokio::test]
async fn existing_index_with_other_dimension_is_rejected() {
    let tmp = TempDir::new().unwrap();
    write_docs(&tmp);
    let index = InMemoryIndex::new();
    index
        .create_index(&IndexSpec {
            name: "api-docs".to_string(),
            dimension: 768,
            metric: Metric::Cosine,
            cloud: "aws".to_string(),
            region: None,
        })
        .await
        .unwrap();

    let err = run_ingest_quiet(&config_for(&tmp), &HashProvider { dims: 384 }, &index)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("768"), "{}", err);
    assert!(index.records("api-docs", "").is_empty());
}
