//! Core data models that flow through the ingestion pipeline.
//!
//! ```text
//! RawDocument ──split──▶ RawDocument (window) ──format──▶ Chunk
//!     Chunk / text ──embed──▶ VectorRecord ──upsert──▶ index
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form metadata attached to documents, chunks, and vector records.
pub type Metadata = Map<String, Value>;

/// Text extracted from one source file, before splitting.
///
/// After splitting, each window is also carried as a `RawDocument` with the
/// source metadata copied onto it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub text: String,
    pub metadata: Metadata,
}

impl RawDocument {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// The `source` metadata entry, if the parser supplied one.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }

    /// Length of the text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A window of document text that survived the minimum-length filter.
///
/// `chunk_id` is the window's ordinal in the flattened split sequence. It
/// shifts whenever the set of input documents changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub metadata: Metadata,
    pub chunk_id: String,
}

/// Input accepted by the store: either a bare string or a formatted chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkInput {
    Text(String),
    Record(Chunk),
}

impl ChunkInput {
    pub fn text(&self) -> &str {
        match self {
            ChunkInput::Text(text) => text,
            ChunkInput::Record(chunk) => &chunk.text,
        }
    }
}

impl From<Chunk> for ChunkInput {
    fn from(chunk: Chunk) -> Self {
        ChunkInput::Record(chunk)
    }
}

impl From<String> for ChunkInput {
    fn from(text: String) -> Self {
        ChunkInput::Text(text)
    }
}

impl From<&str> for ChunkInput {
    fn from(text: &str) -> Self {
        ChunkInput::Text(text.to_string())
    }
}

/// One `(id, vector, metadata)` triple as sent to the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_len_counts_characters_not_bytes() {
        let doc = RawDocument::new("naïve café ✓", Metadata::new());
        assert_eq!(doc.char_len(), 12);
        assert!(doc.text.len() > doc.char_len());
    }
}
