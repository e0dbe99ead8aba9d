//! OCR engine abstraction and the timeout-bounded invoker.
//!
//! The engine is an opaque capability: page image + language hint in, text
//! out, fallible. [`EngineInvoker`] wraps every call with the configured
//! timeout; retry policy, if any, belongs to the caller, never to this layer.

pub mod tesseract;

use crate::error::{PipelineError, Result};
use crate::types::PageImage;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use tesseract::TesseractEngine;

/// An external OCR engine.
///
/// Implementations must be safe to call from many tasks at once; the caller
/// is responsible for gating concurrency through the worker pool.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize the text on one page image.
    async fn recognize(&self, page: &PageImage, language: &str) -> Result<String>;

    /// Short identifier for log fields.
    fn name(&self) -> &'static str {
        "engine"
    }
}

/// Timeout wrapper around an [`OcrEngine`].
///
/// On timeout the call is abandoned and [`PipelineError::EngineTimeout`] is
/// returned; the worker permit held by the caller is reclaimed regardless.
/// Whether the underlying engine work actually stops depends on the engine:
/// the subprocess-backed [`TesseractEngine`] kills its child when the call
/// future is dropped, while an engine without native cancellation may keep
/// consuming resources in the background after its result is discarded.
pub struct EngineInvoker {
    engine: Arc<dyn OcrEngine>,
    timeout: Duration,
}

impl EngineInvoker {
    pub fn new(engine: Arc<dyn OcrEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    pub async fn recognize(&self, page: &PageImage, language: &str) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.engine.recognize(page, language)).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                tracing::warn!(
                    engine = self.engine.name(),
                    page = page.index,
                    timeout_ms,
                    "engine call timed out, abandoning"
                );
                Err(PipelineError::EngineTimeout {
                    page: page.index,
                    timeout_ms,
                })
            }
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Validate a language hint before it reaches the engine command line.
///
/// Accepts Tesseract-style codes and `+`-joined combinations (`"ind+eng"`).
/// Anything else is rejected up front as an invalid document parameter.
pub fn validate_language(language: &str) -> Result<()> {
    if language.is_empty() || language.len() > 64 {
        return Err(PipelineError::InvalidDocument(format!(
            "language hint has invalid length: {:?}",
            language
        )));
    }
    for part in language.split('+') {
        if part.is_empty()
            || !part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(PipelineError::InvalidDocument(format!(
                "invalid language hint: {:?}",
                language
            )));
        }
    }
    Ok(())
}
