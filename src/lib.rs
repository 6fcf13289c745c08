//! # doc-ingest
//!
//! Document ingestion for retrieval-augmented generation: load a directory
//! of documents, split them into overlapping windows, embed the surviving
//! chunks with a pretrained sentence-embedding model, and upsert the vectors
//! into a managed vector index.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌──────────┐
//! │  Loader  │──▶│ Splitter │──▶│ Formatter │──▶│ Embedder │──▶│  Index   │
//! │ pdf/html │   │ windows  │   │  chunks   │   │ MiniLM   │   │ upsert   │
//! └──────────┘   └──────────┘   └───────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ingest init                   # scaffold config/ingest.toml, .env.example, docs/
//! ingest load                   # list what would be loaded
//! ingest run --dry-run          # load + split + format, print counts
//! ingest run                    # embed and upsert
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Per-format text extraction |
//! | [`loader`] | Directory walking |
//! | [`splitter`] | Recursive text splitting |
//! | [`formatter`] | Minimum-length filter and chunk numbering |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index abstraction and backends |
//! | [`store`] | Embed-and-upsert |
//! | [`ingest`] | Pipeline orchestration |
//! | [`scaffold`] | Project scaffolding |
//! | [`progress`] | Stage progress on stderr |

pub mod config;
pub mod embedding;
pub mod extract;
pub mod formatter;
pub mod index;
pub mod ingest;
pub mod loader;
pub mod models;
pub mod progress;
pub mod scaffold;
pub mod splitter;
pub mod store;
