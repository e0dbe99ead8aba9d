//! Single-image documents.
//!
//! An image document is always exactly one page; the zoom factor scales the
//! bitmap before recognition the same way it scales PDF rasterization.

use super::{PageRenderer, apply_page_cap};
use crate::error::{PipelineError, Result};
use crate::types::{Document, PageImage, RenderedPages};
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;

/// Renderer for raster image documents (PNG, JPEG).
pub struct ImagePageRenderer;

impl ImagePageRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImagePageRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRenderer for ImagePageRenderer {
    fn render(&self, document: &Document, zoom: f32, page_cap: usize) -> Result<RenderedPages> {
        let decoded = image::load_from_memory(&document.content).map_err(|e| match e {
            image::ImageError::Unsupported(e) => {
                PipelineError::UnsupportedFormat(format!("cannot decode image: {e}"))
            }
            e => PipelineError::RenderFailure(format!("failed to decode image: {e}")),
        })?;

        let mut gray = decoded.into_luma8();
        if (zoom - 1.0).abs() > f32::EPSILON {
            let width = ((gray.width() as f32 * zoom).round() as u32).max(1);
            let height = ((gray.height() as f32 * zoom).round() as u32).max(1);
            gray = image::imageops::resize(&gray, width, height, FilterType::Triangle);
        }

        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(
                gray.as_raw(),
                gray.width(),
                gray.height(),
                image::ExtendedColorType::L8,
            )
            .map_err(|e| PipelineError::RenderFailure(format!("failed to encode image: {e}")))?;

        // A one-page document can never exceed a nonzero cap.
        let (_, truncated) = apply_page_cap(1, page_cap);
        Ok(RenderedPages {
            pages: vec![PageImage {
                index: 1,
                width: gray.width(),
                height: gray.height(),
                png,
            }],
            truncated,
        })
    }
}
