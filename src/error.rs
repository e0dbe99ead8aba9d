//! Error types for ocrflow.
//!
//! All pipeline failures use [`PipelineError`]. Variants carry owned strings
//! and derive `Clone` so that a single job failure can be handed to every
//! caller coalesced onto that job.
//!
//! Cacheability: no error variant is ever stored in the result cache. Render
//! and engine failures are treated as transient and a later identical request
//! runs the full pipeline again. `InvalidDocument` and `InvalidConfiguration`
//! are rejected before a job even exists.
use thiserror::Error;

/// Result type alias using `PipelineError`.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure taxonomy of the OCR pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Malformed or empty input, rejected before fingerprinting.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The declared format has no renderer.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Rasterization failed (corrupt file, missing pdfium, decode error).
    #[error("render failure: {0}")]
    RenderFailure(String),

    /// The OCR engine returned an error for a page.
    #[error("engine failure on page {page}: {message}")]
    EngineFailure { page: usize, message: String },

    /// The OCR engine did not return within the configured timeout.
    #[error("engine timed out on page {page} after {timeout_ms}ms")]
    EngineTimeout { page: usize, timeout_ms: u64 },

    /// Rejected at startup, never at request time.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Runtime-level faults (panicked worker task, aborted job).
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Create an [`PipelineError::EngineFailure`] for the given page.
    pub fn engine<S: Into<String>>(page: usize, message: S) -> Self {
        Self::EngineFailure {
            page,
            message: message.into(),
        }
    }

    /// True when the error originates in the engine call itself.
    pub fn is_engine_error(&self) -> bool {
        matches!(self, Self::EngineFailure { .. } | Self::EngineTimeout { .. })
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(format!("io error: {err}"))
    }
}
