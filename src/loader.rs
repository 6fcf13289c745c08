//! Directory loader.
//!
//! Walks a documents directory, picks a parser per file extension, and
//! produces one [`RawDocument`] per parsable file. Files with unknown
//! extensions or that fail to parse are skipped, never fatal.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::DocumentsConfig;
use crate::extract::{extract_text, DocumentFormat};
use crate::models::{Metadata, RawDocument};

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub exclude_globs: Vec<String>,
    pub follow_symlinks: bool,
}

impl From<&DocumentsConfig> for LoadOptions {
    fn from(config: &DocumentsConfig) -> Self {
        Self {
            exclude_globs: config.exclude_globs.clone(),
            follow_symlinks: config.follow_symlinks,
        }
    }
}

/// Why a file under the documents directory produced no document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedExtension,
    Unreadable(String),
    ParseFailed(String),
}

#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Documents loaded from a directory plus everything that was passed over.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<RawDocument>,
    pub skipped: Vec<SkippedFile>,
}

impl LoadReport {
    /// Skipped files that had a supported extension but could not be read.
    pub fn failures(&self) -> impl Iterator<Item = &SkippedFile> {
        self.skipped
            .iter()
            .filter(|s| s.reason != SkipReason::UnsupportedExtension)
    }
}

/// Loads every parsable document beneath `dir`.
pub fn load_documents(dir: &Path, options: &LoadOptions) -> Result<Vec<RawDocument>> {
    Ok(scan_documents(dir, options)?.documents)
}

/// Like [`load_documents`], but also reports the files that were skipped.
pub fn scan_documents(dir: &Path, options: &LoadOptions) -> Result<LoadReport> {
    if !dir.is_dir() {
        bail!("Documents directory does not exist: {}", dir.display());
    }

    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(options.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    let mut report = LoadReport::default();

    for entry in WalkDir::new(dir).follow_links(options.follow_symlinks) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf());
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                report.skipped.push(SkippedFile {
                    path,
                    reason: SkipReason::Unreadable(e.to_string()),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        if exclude_set.is_match(relative) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    // Sorted so ordinals downstream are stable for an unchanged directory.
    files.sort();

    for path in files {
        let Some(format) = DocumentFormat::from_path(&path) else {
            tracing::debug!(path = %path.display(), "unsupported extension");
            report.skipped.push(SkippedFile {
                path,
                reason: SkipReason::UnsupportedExtension,
            });
            continue;
        };

        match load_file(&path, format) {
            Ok(doc) => {
                tracing::debug!(path = %path.display(), chars = doc.char_len(), "loaded");
                report.documents.push(doc);
            }
            Err(reason) => {
                tracing::warn!(path = %path.display(), ?reason, "skipping document");
                report.skipped.push(SkippedFile { path, reason });
            }
        }
    }

    tracing::info!(
        dir = %dir.display(),
        documents = report.documents.len(),
        skipped = report.skipped.len(),
        "loaded documents"
    );

    Ok(report)
}

fn load_file(path: &Path, format: DocumentFormat) -> Result<RawDocument, SkipReason> {
    let bytes = std::fs::read(path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
    let text = extract_text(&bytes, format).map_err(|e| SkipReason::ParseFailed(e.to_string()))?;

    Ok(RawDocument::new(text, file_metadata(path, format)))
}

fn file_metadata(path: &Path, format: DocumentFormat) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(
        "source".to_string(),
        Value::String(path.display().to_string()),
    );
    if let Some(name) = path.file_name() {
        metadata.insert(
            "file_name".to_string(),
            Value::String(name.to_string_lossy().to_string()),
        );
    }
    metadata.insert(
        "format".to_string(),
        Value::String(format.as_str().to_string()),
    );
    if let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) {
        let modified: DateTime<Utc> = modified.into();
        metadata.insert("modified".to_string(), Value::String(modified.to_rfc3339()));
    }
    metadata
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn only_unrecognized_extensions_loads_nothing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("image.png"), [0u8, 1, 2]).unwrap();
        fs::write(tmp.path().join("notes.docx"), "not really").unwrap();
        fs::write(tmp.path().join("Makefile"), "all:").unwrap();

        let report = scan_documents(tmp.path(), &LoadOptions::default()).unwrap();
        assert!(report.documents.is_empty());
        assert_eq!(report.skipped.len(), 3);
        assert_eq!(report.failures().count(), 0);
    }

    #[test]
    fn loads_recursively_in_path_order() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("guides/deep")).unwrap();
        fs::write(tmp.path().join("b.txt"), "bravo").unwrap();
        fs::write(tmp.path().join("a.md"), "# alpha").unwrap();
        fs::write(tmp.path().join("guides/deep/c.json"), "{\"c\": true}").unwrap();

        let docs = load_documents(tmp.path(), &LoadOptions::default()).unwrap();
        let names: Vec<&str> = docs
            .iter()
            .map(|d| d.metadata["file_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt", "c.json"]);
        assert_eq!(docs[0].metadata["format"], "markdown");
        assert!(docs[2].source().unwrap().ends_with("c.json"));
        assert!(docs[0].metadata.contains_key("modified"));
    }

    #[test]
    fn parse_failures_are_swallowed() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("broken.pdf"), "definitely not a pdf").unwrap();
        fs::write(tmp.path().join("latin1.txt"), [0x63, 0x61, 0x66, 0xe9]).unwrap();
        fs::write(tmp.path().join("ok.txt"), "fine").unwrap();

        let report = scan_documents(tmp.path(), &LoadOptions::default()).unwrap();
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].text, "fine");
        assert_eq!(report.failures().count(), 2);
    }

    #[test]
    fn default_and_configured_excludes() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("node_modules/pkg")).unwrap();
        fs::create_dir_all(tmp.path().join("drafts")).unwrap();
        fs::write(tmp.path().join("node_modules/pkg/README.md"), "vendored").unwrap();
        fs::write(tmp.path().join("drafts/wip.md"), "draft").unwrap();
        fs::write(tmp.path().join("final.md"), "final").unwrap();

        let options = LoadOptions {
            exclude_globs: vec!["drafts/**".to_string()],
            follow_symlinks: false,
        };
        let docs = load_documents(tmp.path(), &options).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "final");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_documents(&tmp.path().join("nope"), &LoadOptions::default()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
