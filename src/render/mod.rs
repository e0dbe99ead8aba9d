//! Page rasterization.
//!
//! A [`PageRenderer`] turns a document into a bounded, ordered sequence of
//! grayscale page images at a given zoom factor. Rendering is synchronous and
//! CPU-bound; the orchestrator runs it on the blocking thread pool.

pub mod image;
pub mod pdf;

use crate::error::Result;
use crate::types::{Document, DocumentFormat, EmbeddedText, RenderedPages};

pub use self::image::ImagePageRenderer;
pub use self::pdf::PdfPageRenderer;

/// Rasterizes documents into page images.
pub trait PageRenderer: Send + Sync {
    /// Render up to `page_cap` pages (0 = unbounded) at the given zoom.
    ///
    /// Stopping at the cap is signaled through `RenderedPages::truncated`,
    /// never as an error. Zoom has been validated upstream; implementations
    /// must honor any positive value without clamping.
    fn render(&self, document: &Document, zoom: f32, page_cap: usize) -> Result<RenderedPages>;

    /// Machine-readable text layer, when the format carries one. The default
    /// is "no text layer", which forces OCR.
    fn embedded_text(&self, _document: &Document) -> Result<Option<EmbeddedText>> {
        Ok(None)
    }
}

/// Format-dispatching renderer over the concrete PDF and image backends.
pub struct DocumentRenderer {
    pdf: PdfPageRenderer,
    image: ImagePageRenderer,
}

impl DocumentRenderer {
    pub fn new() -> Self {
        Self {
            pdf: PdfPageRenderer::new(),
            image: ImagePageRenderer::new(),
        }
    }
}

impl Default for DocumentRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRenderer for DocumentRenderer {
    fn render(&self, document: &Document, zoom: f32, page_cap: usize) -> Result<RenderedPages> {
        match document.format {
            DocumentFormat::Pdf => self.pdf.render(document, zoom, page_cap),
            DocumentFormat::Image => self.image.render(document, zoom, page_cap),
        }
    }

    fn embedded_text(&self, document: &Document) -> Result<Option<EmbeddedText>> {
        match document.format {
            DocumentFormat::Pdf => self.pdf.embedded_text(document),
            DocumentFormat::Image => Ok(None),
        }
    }
}

/// Shared cap arithmetic: how many of `total` pages to produce, and whether
/// that truncates the document.
pub(crate) fn apply_page_cap(total: usize, page_cap: usize) -> (usize, bool) {
    if page_cap == 0 || total <= page_cap {
        (total, false)
    } else {
        (page_cap, true)
    }
}
