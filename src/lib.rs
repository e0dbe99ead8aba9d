//! ocrflow - Deduplicating, Concurrency-Bounded OCR Pipeline
//!
//! ocrflow turns documents (PDFs and raster images) into text through an
//! external OCR engine while protecting the host from redundant and unbounded
//! engine work. Identical requests are collapsed onto a single computation,
//! completed results are cached with a fixed TTL and an LRU capacity bound,
//! and a worker pool caps how many engine invocations run at once.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ocrflow::{Document, DocumentFormat, Pipeline, PipelineConfig};
//!
//! # async fn run() -> ocrflow::Result<()> {
//! let pipeline = Pipeline::new(PipelineConfig::from_env()?)?;
//!
//! let pdf_bytes = tokio::fs::read("scan.pdf").await?;
//! let outcome = pipeline
//!     .process(Document::new(pdf_bytes, DocumentFormat::Pdf).with_language("ind+eng"))
//!     .await?;
//! println!("{} ({} pages)", outcome.text, outcome.page_count);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Pipeline** (`pipeline`): request validation and job orchestration
//! - **Cache** (`cache`): TTL + LRU result cache with in-flight coalescing
//! - **Render** (`render`): pdfium/image rasterization to grayscale pages
//! - **Engine** (`engine`): OCR engine trait, Tesseract subprocess backend,
//!   timeout-bounded invoker
//! - **Pool** (`pool`): process-wide engine concurrency gate

#![deny(unsafe_code)]

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod pipeline;
pub mod pool;
pub mod render;
pub mod types;

pub use cache::{CacheStats, ResultCache};
pub use config::PipelineConfig;
pub use engine::{EngineInvoker, OcrEngine, TesseractEngine};
pub use error::{PipelineError, Result};
pub use fingerprint::Fingerprint;
pub use pipeline::Pipeline;
pub use pool::{WorkerPermit, WorkerPool};
pub use render::{DocumentRenderer, ImagePageRenderer, PageRenderer, PdfPageRenderer};
pub use types::{
    Document, DocumentFormat, EmbeddedText, OcrOutcome, PageImage, ProcessOutcome, RenderedPages,
};
