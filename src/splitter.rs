//! Recursive separator-based text splitter.
//!
//! Breaks text into overlapping windows of at most `chunk_size` characters.
//! Splitting prefers paragraph breaks, then line breaks, then spaces, and
//! finally falls back to raw character slicing.
//!
//! # Algorithm
//!
//! 1. Pick the first separator in [`SEPARATORS`] that occurs in the text.
//! 2. Split on it, keeping the separator at the start of the following piece.
//! 3. Merge consecutive short pieces into windows. After a window is emitted,
//!    drop pieces from its front until at most `chunk_overlap` characters
//!    remain; those seed the next window.
//! 4. Pieces that are themselves too long are split again with the remaining
//!    separators.
//!
//! Lengths are measured in characters, not bytes.

use anyhow::{bail, Result};

use crate::models::RawDocument;

/// Separators tried in order. The empty separator splits into characters.
pub const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if chunk_overlap > chunk_size {
            bail!(
                "chunk_overlap ({}) is larger than chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits `text` into trimmed, non-empty windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, SEPARATORS)
    }

    /// Splits every document, copying its metadata onto each window.
    pub fn split_documents(&self, documents: &[RawDocument]) -> Vec<RawDocument> {
        let mut windows = Vec::new();
        for doc in documents {
            for text in self.split_text(&doc.text) {
                windows.push(RawDocument::new(text, doc.metadata.clone()));
            }
        }
        windows
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep;
                break;
            }
            if text.contains(sep) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut windows = Vec::new();
        let mut short_pieces: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                short_pieces.push(piece);
                continue;
            }
            if !short_pieces.is_empty() {
                windows.extend(self.merge_pieces(&short_pieces));
                short_pieces.clear();
            }
            if remaining.is_empty() {
                if let Some(window) = join_trimmed(&[piece]) {
                    windows.push(window);
                }
            } else {
                windows.extend(self.split_recursive(piece, remaining));
            }
        }

        if !short_pieces.is_empty() {
            windows.extend(self.merge_pieces(&short_pieces));
        }

        windows
    }

    /// Greedily packs pieces into windows, carrying up to `chunk_overlap`
    /// characters from the tail of each window into the next.
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_start = 0usize;
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    tracing::debug!(
                        size = total,
                        limit = self.chunk_size,
                        "window longer than chunk_size"
                    );
                }
                if current_start < current.len() {
                    if let Some(window) = join_trimmed(&current[current_start..]) {
                        windows.push(window);
                    }
                    while total > self.chunk_overlap
                        || (total + len > self.chunk_size && total > 0)
                    {
                        total -= char_len(current[current_start]);
                        current_start += 1;
                    }
                }
            }
            current.push(piece);
            total += len;
        }

        if let Some(window) = join_trimmed(&current[current_start..]) {
            windows.push(window);
        }
        windows
    }
}

/// Splits on `separator`, attaching each separator occurrence to the start
/// of the piece that follows it. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_trimmed(pieces: &[&str]) -> Option<String> {
    let joined = pieces.concat();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;
    use serde_json::json;

    #[test]
    fn rejects_overlap_larger_than_size() {
        assert!(RecursiveSplitter::new(10, 11).is_err());
        assert!(RecursiveSplitter::new(0, 0).is_err());
        assert!(RecursiveSplitter::new(10, 10).is_ok());
    }

    #[test]
    fn short_text_is_single_window() {
        let splitter = RecursiveSplitter::new(1000, 100).unwrap();
        assert_eq!(splitter.split_text("  Hello, world!\n"), vec!["Hello, world!"]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        let splitter = RecursiveSplitter::new(1000, 100).unwrap();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text(" \n\n \n").is_empty());
    }

    #[test]
    fn separator_kept_at_start_of_next_piece() {
        assert_eq!(
            split_keeping_separator("a\n\n\n\nb", "\n\n"),
            vec!["a", "\n\n", "\n\nb"]
        );
        assert_eq!(split_keeping_separator("\n\nab", "\n\n"), vec!["\n\nab"]);
        assert_eq!(split_keeping_separator("héllo", ""), vec!["h", "é", "l", "l", "o"]);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let splitter = RecursiveSplitter::new(30, 0).unwrap();
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird one.";
        let windows = splitter.split_text(text);
        assert_eq!(
            windows,
            vec!["First paragraph here.", "Second paragraph here.", "Third one."]
        );
    }

    #[test]
    fn falls_back_to_character_slicing() {
        let splitter = RecursiveSplitter::new(1000, 100).unwrap();
        let text = "a".repeat(2500);
        let windows = splitter.split_text(&text);
        let lens: Vec<usize> = windows.iter().map(|w| w.len()).collect();
        assert_eq!(lens, vec![1000, 1000, 700]);
    }

    #[test]
    fn window_count_matches_overlap_formula() {
        let (size, overlap) = (100usize, 20usize);
        let splitter = RecursiveSplitter::new(size, overlap).unwrap();
        let text = "x".repeat(1000);
        let windows = splitter.split_text(&text);
        let expected = (1000 - overlap).div_ceil(size - overlap);
        assert_eq!(windows.len(), expected);
        for w in &windows {
            assert!(w.chars().count() <= size);
        }
    }

    #[test]
    fn consecutive_windows_overlap_on_words() {
        let splitter = RecursiveSplitter::new(40, 15).unwrap();
        let text = (0..30)
            .map(|i| format!("w{:02}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let windows = splitter.split_text(&text);
        assert!(windows.len() > 1);
        for pair in windows.windows(2) {
            let first_word_of_next = pair[1].split(' ').next().unwrap();
            assert!(
                pair[0].contains(first_word_of_next),
                "{:?} should overlap {:?}",
                pair[0],
                pair[1]
            );
        }
        for w in &windows {
            assert!(w.chars().count() <= 40, "{:?}", w);
        }
    }

    #[test]
    fn counts_characters_not_bytes() {
        let splitter = RecursiveSplitter::new(10, 0).unwrap();
        let text = "é".repeat(20);
        let windows = splitter.split_text(&text);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].chars().count(), 10);
    }

    #[test]
    fn split_documents_copies_metadata() {
        let splitter = RecursiveSplitter::new(10, 0).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), json!("docs/a.md"));
        let docs = vec![RawDocument::new("one two three four five", metadata)];
        let windows = splitter.split_documents(&docs);
        assert!(windows.len() > 1);
        for w in &windows {
            assert_eq!(w.source(), Some("docs/a.md"));
        }
    }
}
