//! Ingest progress reporting.
//!
//! Reports which pipeline stage is running and how far along it is. Progress
//! is emitted on **stderr** so stdout stays parseable for scripts.

use std::io::Write;

/// A single progress event for `ingest run`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestProgressEvent {
    /// Walking the documents directory. Total unknown.
    Loading { dir: String },
    /// Documents loaded and split; `chunks` survived the length filter.
    Chunked { documents: u64, chunks: u64 },
    /// `n` of `total` chunks embedded.
    Embedding { n: u64, total: u64 },
    /// `n` of `total` vectors upserted.
    Upserting { n: u64, total: u64 },
}

/// Reports ingest progress. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest  upserting  1,200 / 5,000 vectors".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Loading { dir } => format!("ingest  loading {}...\n", dir),
            IngestProgressEvent::Chunked { documents, chunks } => format!(
                "ingest  chunked  {} documents into {} chunks\n",
                format_number(*documents),
                format_number(*chunks)
            ),
            IngestProgressEvent::Embedding { n, total } => format!(
                "ingest  embedding  {} / {} chunks\n",
                format_number(*n),
                format_number(*total)
            ),
            IngestProgressEvent::Upserting { n, total } => format!(
                "ingest  upserting  {} / {} vectors\n",
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Loading { dir } => serde_json::json!({
                "event": "progress",
                "phase": "loading",
                "dir": dir
            }),
            IngestProgressEvent::Chunked { documents, chunks } => serde_json::json!({
                "event": "progress",
                "phase": "chunked",
                "documents": documents,
                "chunks": chunks
            }),
            IngestProgressEvent::Embedding { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "n": n,
                "total": total
            }),
            IngestProgressEvent::Upserting { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "upserting",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
