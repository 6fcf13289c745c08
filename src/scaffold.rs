//! Project scaffolding for `ingest init`.
//!
//! Creates the files a new ingestion project needs. Existing files are left
//! untouched, so running it twice is safe.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const CONFIG_TEMPLATE: &str = r#"# doc-ingest configuration.
#
# Run:   ingest run --config config/ingest.toml
# Check: ingest run --dry-run

[documents]
dir = "docs"
# exclude_globs = ["drafts/**"]
# follow_symlinks = false

[chunking]
chunk_size = 1000
chunk_overlap = 100
min_chunk_length = 50

[embedding]
provider = "local"          # local | disabled
model = "all-minilm-l6-v2"  # sentence-transformers/all-MiniLM-L6-v2
dims = 384
batch_size = 64

[index]
name = "api-docs"
dimension = 384
metric = "cosine"           # cosine | euclidean | dotproduct
# environment = "us-east-1" # or PINECONE_ENVIRONMENT
cloud = "aws"
namespace = ""
# controller_url = "https://api.pinecone.io"
upsert_batch_size = 100
timeout_secs = 30
max_retries = 3
"#;

const ENV_TEMPLATE: &str = "PINECONE_API_KEY=\nPINECONE_ENVIRONMENT=us-east-1\n";

/// Files created by [`scaffold_project`], relative to the project root.
pub const SCAFFOLD_FILES: &[(&str, &str)] = &[
    ("config/ingest.toml", CONFIG_TEMPLATE),
    (".env.example", ENV_TEMPLATE),
    ("docs/.gitkeep", ""),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaffoldStatus {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldEntry {
    pub path: PathBuf,
    pub status: ScaffoldStatus,
}

/// Creates every missing scaffold file under `root`.
pub fn scaffold_project(root: &Path) -> Result<Vec<ScaffoldEntry>> {
    let mut entries = Vec::with_capacity(SCAFFOLD_FILES.len());

    for (relative, contents) in SCAFFOLD_FILES {
        let path = root.join(relative);
        if path.exists() {
            tracing::info!(path = %path.display(), "path already exists");
            entries.push(ScaffoldEntry {
                path,
                status: ScaffoldStatus::AlreadyExists,
            });
            continue;
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        tracing::info!(path = %path.display(), "creating path");
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        entries.push(ScaffoldEntry {
            path,
            status: ScaffoldStatus::Created,
        });
    }

    Ok(entries)
}
