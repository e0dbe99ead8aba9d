//! Core data model: documents, page images, and pipeline outcomes.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Declared format of an inbound document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Multi-page PDF.
    Pdf,
    /// Single raster image (PNG, JPEG).
    Image,
}

impl DocumentFormat {
    /// Stable identifier used in fingerprints and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
        }
    }
}

/// A document submitted for OCR.
///
/// Immutable once constructed; owned by exactly one in-flight job after a
/// cache miss.
#[derive(Debug, Clone)]
pub struct Document {
    /// Raw file bytes.
    pub content: Vec<u8>,
    /// Declared format.
    pub format: DocumentFormat,
    /// Requested language hint (e.g. `"eng"`, `"ind+eng"`); falls back to the
    /// configured default when absent.
    pub language: Option<String>,
    /// Per-request zoom override; must be positive when set.
    pub zoom: Option<f32>,
}

impl Document {
    pub fn new(content: Vec<u8>, format: DocumentFormat) -> Self {
        Self {
            content,
            format,
            language: None,
            zoom: None,
        }
    }

    pub fn with_language<S: Into<String>>(mut self, language: S) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.zoom = Some(zoom);
        self
    }
}

/// One rasterized page, transient within a job.
///
/// `index` is 1-based and defines concatenation order.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// PNG-encoded grayscale bitmap handed to the engine.
    pub png: Vec<u8>,
}

/// Output of rasterizing a document.
#[derive(Debug, Clone, Default)]
pub struct RenderedPages {
    /// Pages in document order.
    pub pages: Vec<PageImage>,
    /// Set when the configured page cap cut off later pages. A policy
    /// decision, not a fault.
    pub truncated: bool,
}

/// Machine-readable text layer of a document, when the format carries one.
#[derive(Debug, Clone)]
pub struct EmbeddedText {
    pub text: String,
    pub page_count: usize,
}

/// Completed OCR result for one fingerprint; the payload stored in the
/// result cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrOutcome {
    /// Per-page texts concatenated in page order.
    pub text: String,
    /// True when the page cap cut off later pages.
    pub truncated: bool,
    /// Number of pages that contributed to `text`.
    pub page_count: usize,
}

/// What [`crate::pipeline::Pipeline::process`] hands back to the caller.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub text: String,
    pub truncated: bool,
    /// True when served from a stored cache entry. Coalesced waiters and the
    /// computing caller both report `false`.
    pub cached: bool,
    pub page_count: usize,
    /// Wall-clock time spent in `process`, including any coalesced wait.
    pub elapsed: Duration,
}

/// Count of non-whitespace characters, the measure used to decide whether an
/// embedded text layer is usable without OCR.
pub(crate) fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_as_str() {
        assert_eq!(DocumentFormat::Pdf.as_str(), "pdf");
        assert_eq!(DocumentFormat::Image.as_str(), "image");
    }

    #[test]
    fn test_document_builder() {
        let doc = Document::new(vec![1, 2, 3], DocumentFormat::Pdf)
            .with_language("ind+eng")
            .with_zoom(2.0);
        assert_eq!(doc.content, vec![1, 2, 3]);
        assert_eq!(doc.language.as_deref(), Some("ind+eng"));
        assert_eq!(doc.zoom, Some(2.0));
    }

    #[test]
    fn test_document_defaults() {
        let doc = Document::new(Vec::new(), DocumentFormat::Image);
        assert!(doc.language.is_none());
        assert!(doc.zoom.is_none());
    }

    #[test]
    fn test_visible_chars() {
        assert_eq!(visible_chars(""), 0);
        assert_eq!(visible_chars("  \n\t "), 0);
        assert_eq!(visible_chars("a b\nc"), 3);
    }
}
