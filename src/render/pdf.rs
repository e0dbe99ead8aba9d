//! PDF rasterization and text-layer extraction via pdfium.
//!
//! The pdfium library is bound lazily per call; the binding itself is cheap
//! next to rendering, and keeping the renderer stateless makes it trivially
//! `Send + Sync`. Page size in points times the zoom factor gives the output
//! pixel size, so zoom 1.0 renders at 72 dpi equivalent.

use super::{PageRenderer, apply_page_cap};
use crate::error::{PipelineError, Result};
use crate::types::{Document, EmbeddedText, PageImage, RenderedPages};
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use pdfium_render::prelude::*;

/// pdfium-backed renderer for multi-page PDF documents.
pub struct PdfPageRenderer;

impl PdfPageRenderer {
    pub fn new() -> Self {
        Self
    }

    fn bind() -> Result<Pdfium> {
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map(Pdfium::new)
            .map_err(|e| {
                PipelineError::RenderFailure(format!("failed to bind pdfium library: {e}"))
            })
    }

    fn load<'a>(pdfium: &'a Pdfium, document: &'a Document) -> Result<PdfDocument<'a>> {
        pdfium
            .load_pdf_from_byte_slice(&document.content, None)
            .map_err(|e| PipelineError::RenderFailure(format!("failed to load PDF: {e}")))
    }
}

impl Default for PdfPageRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRenderer for PdfPageRenderer {
    fn render(&self, document: &Document, zoom: f32, page_cap: usize) -> Result<RenderedPages> {
        let pdfium = Self::bind()?;
        let pdf = Self::load(&pdfium, document)?;

        let total = pdf.pages().len() as usize;
        let (take, truncated) = apply_page_cap(total, page_cap);

        let mut pages = Vec::with_capacity(take);
        for (i, page) in pdf.pages().iter().take(take).enumerate() {
            let index = i + 1;
            let width = ((page.width().value * zoom).round() as i32).max(1);
            let height = ((page.height().value * zoom).round() as i32).max(1);

            let config = PdfRenderConfig::new()
                .set_target_width(width)
                .set_target_height(height)
                .rotate_if_landscape(PdfPageRenderRotation::None, false);

            let bitmap = page.render_with_config(&config).map_err(|e| {
                PipelineError::RenderFailure(format!("failed to render page {index}: {e}"))
            })?;

            let gray = bitmap.as_image().into_luma8();
            let mut png = Vec::new();
            PngEncoder::new(&mut png)
                .write_image(
                    gray.as_raw(),
                    gray.width(),
                    gray.height(),
                    image::ExtendedColorType::L8,
                )
                .map_err(|e| {
                    PipelineError::RenderFailure(format!("failed to encode page {index}: {e}"))
                })?;

            pages.push(PageImage {
                index,
                width: gray.width(),
                height: gray.height(),
                png,
            });
        }

        tracing::debug!(
            total_pages = total,
            rendered = pages.len(),
            truncated,
            zoom,
            "rendered pdf document"
        );
        Ok(RenderedPages { pages, truncated })
    }

    fn embedded_text(&self, document: &Document) -> Result<Option<EmbeddedText>> {
        let pdfium = Self::bind()?;
        let pdf = Self::load(&pdfium, document)?;

        let page_count = pdf.pages().len() as usize;
        let mut parts = Vec::new();
        for page in pdf.pages().iter() {
            if let Ok(text) = page.text() {
                let content = text.all();
                if !content.trim().is_empty() {
                    parts.push(content);
                }
            }
        }

        if parts.is_empty() {
            return Ok(None);
        }
        Ok(Some(EmbeddedText {
            text: parts.join("\n"),
            page_count,
        }))
    }
}
