//! Turns split windows into [`Chunk`] records.
//!
//! Each window is trimmed and checked against a minimum length. Short windows
//! are dropped outright (their text is not merged into a neighbour). Survivors
//! are numbered by their position in the flattened input, so ids have gaps
//! wherever a window was dropped.
//!
//! Every chunk carries a SHA-256 `content_hash` of its text in metadata.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::{Chunk, RawDocument};

/// Formats `windows` into chunks, dropping any whose trimmed text has fewer
/// than `min_length` characters.
pub fn format_chunks(windows: &[RawDocument], min_length: usize) -> Vec<Chunk> {
    let mut chunks = Vec::with_capacity(windows.len());
    let mut dropped = 0usize;

    for (position, window) in windows.iter().enumerate() {
        let text = window.text.trim();
        if text.chars().count() < min_length {
            dropped += 1;
            continue;
        }
        chunks.push(make_chunk(position, text, window));
    }

    if dropped > 0 {
        tracing::debug!(dropped, min_length, "dropped short windows");
    }

    chunks
}

fn make_chunk(position: usize, text: &str, window: &RawDocument) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let mut metadata = window.metadata.clone();
    metadata.insert("content_hash".to_string(), Value::String(hash));

    Chunk {
        text: text.to_string(),
        metadata,
        chunk_id: position.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use serde_json::json;

    fn window(text: &str) -> RawDocument {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), json!("docs/guide.md"));
        RawDocument::new(text, metadata)
    }

    #[test]
    fn short_windows_dropped() {
        let windows = vec![window("   tiny   "), window("long enough text")];
        let chunks = format_chunks(&windows, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "long enough text");
    }

    #[test]
    fn ids_follow_input_position() {
        let windows = vec![
            window("first window text"),
            window("no"),
            window("third window text"),
        ];
        let chunks = format_chunks(&windows, 5);
        let ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["0", "2"]);
    }

    #[test]
    fn exact_minimum_is_kept() {
        let chunks = format_chunks(&[window("abcde")], 5);
        assert_eq!(chunks.len(), 1);
        let chunks = format_chunks(&[window("abcd")], 5);
        assert!(chunks.is_empty());
    }

    #[test]
    fn minimum_counts_characters() {
        // 5 chars, 10 bytes
        let chunks = format_chunks(&[window("ééééé")], 6);
        assert!(chunks.is_empty());
    }

    #[test]
    fn metadata_copied_with_hash() {
        let chunks = format_chunks(&[window("hello world")], 1);
        let meta = &chunks[0].metadata;
        assert_eq!(meta["source"], "docs/guide.md");
        assert_eq!(
            meta["content_hash"],
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn deterministic() {
        let windows = vec![window("Alpha beta gamma"), window("Delta epsilon zeta")];
        let a = format_chunks(&windows, 3);
        let b = format_chunks(&windows, 3);
        assert_eq!(a, b);
    }
}
