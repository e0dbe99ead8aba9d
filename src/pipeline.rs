//! The OCR pipeline orchestrator.
//!
//! [`Pipeline::process`] is the single entry point: validate the request,
//! fingerprint it, and either serve a cached outcome or run the job under the
//! coalescing cache. A job renders pages on the blocking thread pool, then
//! recognizes them sequentially, each page under a worker permit and the
//! per-call timeout.
//!
//! The compute path is handed to the cache as a detached future, so a caller
//! that disconnects mid-job never wastes the work: the outcome still lands in
//! the cache for whoever asks next.

use crate::cache::{CacheStats, ResultCache};
use crate::config::PipelineConfig;
use crate::engine::{EngineInvoker, OcrEngine, TesseractEngine, validate_language};
use crate::error::{PipelineError, Result};
use crate::fingerprint::Fingerprint;
use crate::pool::WorkerPool;
use crate::render::{DocumentRenderer, PageRenderer};
use crate::types::{Document, OcrOutcome, ProcessOutcome, visible_chars};
use std::sync::Arc;
use std::time::Instant;

/// Request-deduplicating, concurrency-bounded OCR pipeline.
///
/// Cheap to clone via `Arc`; one instance serves the whole process.
pub struct Pipeline {
    config: PipelineConfig,
    renderer: Arc<dyn PageRenderer>,
    invoker: Arc<EngineInvoker>,
    pool: WorkerPool,
    cache: Arc<ResultCache<OcrOutcome>>,
}

impl Pipeline {
    /// Pipeline with the stock renderer (pdfium + image) and the Tesseract
    /// subprocess engine.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let engine_threads = config.engine_threads;
        Self::with_parts(
            config,
            Arc::new(DocumentRenderer::new()),
            Arc::new(TesseractEngine::new(engine_threads)),
        )
    }

    /// Pipeline with injected renderer and engine. This is the seam the
    /// integration tests use; production code goes through [`Self::new`].
    pub fn with_parts(
        config: PipelineConfig,
        renderer: Arc<dyn PageRenderer>,
        engine: Arc<dyn OcrEngine>,
    ) -> Result<Self> {
        config.validate()?;
        validate_language(&config.language)?;
        if let Some(fallback) = &config.fallback_language {
            validate_language(fallback)?;
        }

        let invoker = Arc::new(EngineInvoker::new(engine, config.engine_timeout()));
        let pool = WorkerPool::new(config.engine_concurrency);
        let cache = Arc::new(ResultCache::new(config.cache_ttl(), config.cache_max_items));
        Ok(Self {
            config,
            renderer,
            invoker,
            pool,
            cache,
        })
    }

    /// Run one document through the pipeline.
    ///
    /// Identical requests in flight at the same time share a single
    /// computation; identical requests within the cache TTL share a stored
    /// result. Only the stored case reports `cached = true`.
    pub async fn process(&self, document: Document) -> Result<ProcessOutcome> {
        let started = Instant::now();
        self.validate_request(&document)?;

        let language = document
            .language
            .clone()
            .unwrap_or_else(|| self.config.language.clone());
        let zoom = document.zoom.unwrap_or(self.config.zoom);
        let page_cap = self.config.max_pages;

        let fingerprint =
            Fingerprint::compute(&document.content, document.format, &language, zoom, page_cap);
        tracing::debug!(
            fingerprint = %fingerprint.short(),
            format = document.format.as_str(),
            language,
            zoom,
            "processing document"
        );

        let job = JobContext {
            renderer: Arc::clone(&self.renderer),
            invoker: Arc::clone(&self.invoker),
            pool: self.pool.clone(),
            fallback_language: self.config.fallback_language.clone(),
            min_text_chars: self.config.min_text_chars,
        };
        let (outcome, cached) = self
            .cache
            .get_or_compute(fingerprint, move || {
                job.run(Arc::new(document), language, zoom, page_cap)
            })
            .await?;

        let elapsed = started.elapsed();
        tracing::info!(
            fingerprint = %fingerprint.short(),
            cached,
            truncated = outcome.truncated,
            pages = outcome.page_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "document processed"
        );
        Ok(ProcessOutcome {
            text: outcome.text.clone(),
            truncated: outcome.truncated,
            cached,
            page_count: outcome.page_count,
            elapsed,
        })
    }

    fn validate_request(&self, document: &Document) -> Result<()> {
        if document.content.is_empty() {
            return Err(PipelineError::InvalidDocument(
                "document content is empty".to_string(),
            ));
        }
        if let Some(zoom) = document.zoom {
            if !zoom.is_finite() || zoom <= 0.0 {
                return Err(PipelineError::InvalidDocument(format!(
                    "zoom override must be positive and finite, got {zoom}"
                )));
            }
        }
        if let Some(language) = &document.language {
            validate_language(language)?;
        }
        Ok(())
    }

    /// Drop expired cache entries; see [`ResultCache::sweep`].
    pub fn sweep_cache(&self) -> usize {
        self.cache.sweep()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

/// Everything a detached job needs, cloned out of the pipeline so the future
/// owns its world and survives the caller.
struct JobContext {
    renderer: Arc<dyn PageRenderer>,
    invoker: Arc<EngineInvoker>,
    pool: WorkerPool,
    fallback_language: Option<String>,
    min_text_chars: usize,
}

impl JobContext {
    async fn run(
        self,
        document: Arc<Document>,
        language: String,
        zoom: f32,
        page_cap: usize,
    ) -> Result<OcrOutcome> {
        // Serve the machine-readable text layer when it is substantial
        // enough; a scanned PDF typically has none.
        if let Some(embedded) = self.extract_embedded_text(Arc::clone(&document)).await? {
            return Ok(embedded);
        }

        let rendered = {
            let renderer = Arc::clone(&self.renderer);
            let document = Arc::clone(&document);
            tokio::task::spawn_blocking(move || renderer.render(&document, zoom, page_cap))
                .await
                .map_err(|e| PipelineError::Internal(format!("render task failed: {e}")))??
        };

        let mut texts = Vec::with_capacity(rendered.pages.len());
        for page in &rendered.pages {
            // One permit per page call, released between pages so other jobs
            // interleave under the global concurrency cap.
            let permit = self.pool.acquire().await;
            let mut text = self.invoker.recognize(page, &language).await?;

            if visible_chars(&text) == 0 {
                if let Some(fallback) = self
                    .fallback_language
                    .as_deref()
                    .filter(|f| *f != language)
                {
                    tracing::debug!(
                        page = page.index,
                        fallback,
                        "page text blank, retrying with fallback language"
                    );
                    text = self.invoker.recognize(page, fallback).await?;
                }
            }
            drop(permit);
            texts.push(text);
        }

        Ok(OcrOutcome {
            text: texts.join("\n"),
            truncated: rendered.truncated,
            page_count: rendered.pages.len(),
        })
    }

    async fn extract_embedded_text(&self, document: Arc<Document>) -> Result<Option<OcrOutcome>> {
        let renderer = Arc::clone(&self.renderer);
        let embedded = tokio::task::spawn_blocking(move || renderer.embedded_text(&document))
            .await
            .map_err(|e| PipelineError::Internal(format!("text extraction task failed: {e}")))??;

        let Some(embedded) = embedded else {
            return Ok(None);
        };
        if visible_chars(&embedded.text) < self.min_text_chars {
            tracing::debug!(
                chars = visible_chars(&embedded.text),
                threshold = self.min_text_chars,
                "embedded text layer too thin, falling through to ocr"
            );
            return Ok(None);
        }
        tracing::debug!(
            pages = embedded.page_count,
            "serving embedded text layer without ocr"
        );
        Ok(Some(OcrOutcome {
            text: embedded.text,
            truncated: false,
            page_count: embedded.page_count,
        }))
    }
}
