//! Per-format text extraction.
//!
//! The loader hands over raw bytes plus a [`DocumentFormat`] picked from the
//! file extension; this module returns plain UTF-8 text. Failures are typed
//! so the loader can log and skip the file without aborting the walk.

use std::path::Path;

use scraper::{ElementRef, Html, Node};
use thiserror::Error;

/// Elements whose text never reaches the extracted document.
const HTML_IGNORED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Elements that start a new block of text.
const HTML_BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol", "dl", "dt", "dd", "table",
    "tr", "td", "th", "pre", "blockquote", "section", "article", "header", "footer", "nav",
    "main", "aside", "figure", "figcaption", "hr", "body",
];

/// Formats the loader knows how to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Text,
    Html,
    Markdown,
    Json,
}

impl DocumentFormat {
    /// Maps a file extension (case-insensitive) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "txt" => Some(DocumentFormat::Text),
            "html" | "htm" => Some(DocumentFormat::Html),
            "md" => Some(DocumentFormat::Markdown),
            "json" => Some(DocumentFormat::Json),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Text => "text",
            DocumentFormat::Html => "html",
            DocumentFormat::Markdown => "markdown",
            DocumentFormat::Json => "json",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("file is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Extracts plain text from `bytes` according to `format`.
pub fn extract_text(bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractError> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Html => extract_html(bytes),
        DocumentFormat::Text | DocumentFormat::Markdown | DocumentFormat::Json => {
            Ok(String::from_utf8(bytes.to_vec())?)
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Visible text of an HTML page, one block of text per block-level element.
///
/// Inline markup (`b`, `code`, `a`, ...) stays inside its paragraph.
fn extract_html(bytes: &[u8]) -> Result<String, ExtractError> {
    let html = String::from_utf8(bytes.to_vec())?;
    let document = Html::parse_document(&html);

    let mut blocks = HtmlBlocks::default();
    blocks.visit(document.root_element());
    blocks.flush();

    Ok(blocks.done.join("\n\n"))
}

#[derive(Default)]
struct HtmlBlocks {
    current: String,
    done: Vec<String>,
}

impl HtmlBlocks {
    fn visit(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        if HTML_IGNORED_ELEMENTS.contains(&name) {
            return;
        }
        if name == "br" {
            self.current.push(' ');
            return;
        }

        let block = HTML_BLOCK_ELEMENTS.contains(&name);
        if block {
            self.flush();
        }
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.current.push_str(text),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.visit(child);
                    }
                }
                _ => {}
            }
        }
        if block {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let collapsed = collapse_whitespace(&self.current);
        if !collapsed.is_empty() {
            self.done.push(collapsed);
        }
        self.current.clear();
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
