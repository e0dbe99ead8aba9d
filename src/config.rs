//! Pipeline configuration.
//!
//! One immutable [`PipelineConfig`] is constructed at process start and passed
//! into the pipeline; there are no mutable globals. Out-of-range values are a
//! startup error (`validate`), never a request-time one — in particular the
//! zoom factor is accepted at any positive value and never clamped.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable process-wide configuration.
///
/// # Example
///
/// ```rust
/// use ocrflow::PipelineConfig;
///
/// let config = PipelineConfig {
///     engine_concurrency: 2,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rasterization scale applied to every page. Must be positive and
    /// finite; higher values trade CPU and memory for recognition accuracy.
    pub zoom: f32,

    /// Hard cap on pages per document; 0 means unbounded. Exceeding the cap
    /// sets the truncation flag instead of failing.
    pub max_pages: usize,

    /// Maximum simultaneous OCR engine invocations process-wide.
    pub engine_concurrency: usize,

    /// Threads the engine itself may use per invocation.
    pub engine_threads: usize,

    /// Per-call engine timeout in seconds.
    pub engine_timeout_secs: u64,

    /// Fixed cache entry lifetime from creation, in seconds.
    pub cache_ttl_secs: u64,

    /// Capacity bound triggering LRU eviction.
    pub cache_max_items: usize,

    /// Default OCR language when the request carries no hint. Tesseract
    /// combination syntax (`"ind+eng"`) is accepted.
    pub language: String,

    /// Secondary language tried once when a page yields blank text.
    pub fallback_language: Option<String>,

    /// Minimum non-whitespace characters for an embedded text layer to be
    /// served without OCR.
    pub min_text_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            zoom: 1.35,
            max_pages: 4,
            engine_concurrency: 1,
            engine_threads: 1,
            engine_timeout_secs: 120,
            cache_ttl_secs: 900,
            cache_max_items: 256,
            language: "eng".to_string(),
            fallback_language: None,
            min_text_chars: 40,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from process environment variables, starting from
    /// defaults. Unset variables keep their defaults; malformed values are a
    /// startup error.
    ///
    /// Recognized variables: `OCR_ZOOM`, `OCR_MAX_PAGES`, `OCR_CONCURRENCY`,
    /// `OCR_ENGINE_THREADS`, `OCR_ENGINE_TIMEOUT_SECONDS`,
    /// `RESULT_CACHE_TTL_SECONDS`, `RESULT_CACHE_MAX_ITEMS`,
    /// `OCR_LANG_PRIMARY`, `OCR_LANG_FALLBACK`, `OCR_MIN_TEXT_CHARS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`Self::from_env`] but with an injectable variable source, so
    /// tests never touch process state.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup("OCR_ZOOM") {
            config.zoom = parse_var("OCR_ZOOM", &raw)?;
        }
        if let Some(raw) = lookup("OCR_MAX_PAGES") {
            config.max_pages = parse_var("OCR_MAX_PAGES", &raw)?;
        }
        if let Some(raw) = lookup("OCR_CONCURRENCY") {
            config.engine_concurrency = parse_var("OCR_CONCURRENCY", &raw)?;
        }
        if let Some(raw) = lookup("OCR_ENGINE_THREADS") {
            config.engine_threads = parse_var("OCR_ENGINE_THREADS", &raw)?;
        }
        if let Some(raw) = lookup("OCR_ENGINE_TIMEOUT_SECONDS") {
            config.engine_timeout_secs = parse_var("OCR_ENGINE_TIMEOUT_SECONDS", &raw)?;
        }
        if let Some(raw) = lookup("RESULT_CACHE_TTL_SECONDS") {
            config.cache_ttl_secs = parse_var("RESULT_CACHE_TTL_SECONDS", &raw)?;
        }
        if let Some(raw) = lookup("RESULT_CACHE_MAX_ITEMS") {
            config.cache_max_items = parse_var("RESULT_CACHE_MAX_ITEMS", &raw)?;
        }
        if let Some(lang) = lookup("OCR_LANG_PRIMARY") {
            config.language = lang;
        }
        if let Some(lang) = lookup("OCR_LANG_FALLBACK") {
            config.fallback_language = if lang.is_empty() { None } else { Some(lang) };
        }
        if let Some(raw) = lookup("OCR_MIN_TEXT_CHARS") {
            config.min_text_chars = parse_var("OCR_MIN_TEXT_CHARS", &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values before any request is served.
    pub fn validate(&self) -> Result<()> {
        if !self.zoom.is_finite() || self.zoom <= 0.0 {
            return Err(PipelineError::InvalidConfiguration(format!(
                "zoom must be positive and finite, got {}",
                self.zoom
            )));
        }
        if self.engine_concurrency == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "engine_concurrency must be at least 1".to_string(),
            ));
        }
        if self.engine_threads == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "engine_threads must be at least 1".to_string(),
            ));
        }
        if self.engine_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "engine_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.cache_ttl_secs == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "cache_ttl_secs must be at least 1".to_string(),
            ));
        }
        if self.cache_max_items == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "cache_max_items must be at least 1".to_string(),
            ));
        }
        if self.language.is_empty() {
            return Err(PipelineError::InvalidConfiguration(
                "language must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        PipelineError::InvalidConfiguration(format!("{name} has unparseable value {raw:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |name| map.get(name).map(|v| v.to_string())
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.zoom, 1.35);
        assert_eq!(config.max_pages, 4);
        assert_eq!(config.engine_concurrency, 1);
        assert_eq!(config.cache_ttl(), Duration::from_secs(900));
        assert_eq!(config.cache_max_items, 256);
    }

    #[test]
    fn test_zero_max_pages_is_unbounded_and_valid() {
        let config = PipelineConfig {
            max_pages: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_nonpositive_zoom() {
        for zoom in [0.0, -1.5, f32::NAN, f32::INFINITY] {
            let config = PipelineConfig {
                zoom,
                ..Default::default()
            };
            assert!(matches!(
                config.validate(),
                Err(PipelineError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let config = PipelineConfig {
            engine_concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_cache_bounds() {
        let ttl = PipelineConfig {
            cache_ttl_secs: 0,
            ..Default::default()
        };
        assert!(ttl.validate().is_err());

        let items = PipelineConfig {
            cache_max_items: 0,
            ..Default::default()
        };
        assert!(items.validate().is_err());
    }

    #[test]
    fn test_from_lookup_reads_all_knobs() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("OCR_ZOOM", "2.5"),
            ("OCR_MAX_PAGES", "0"),
            ("OCR_CONCURRENCY", "4"),
            ("OCR_ENGINE_THREADS", "2"),
            ("OCR_ENGINE_TIMEOUT_SECONDS", "30"),
            ("RESULT_CACHE_TTL_SECONDS", "60"),
            ("RESULT_CACHE_MAX_ITEMS", "16"),
            ("OCR_LANG_PRIMARY", "ind+eng"),
            ("OCR_LANG_FALLBACK", "eng"),
            ("OCR_MIN_TEXT_CHARS", "10"),
        ]))
        .unwrap();

        assert_eq!(config.zoom, 2.5);
        assert_eq!(config.max_pages, 0);
        assert_eq!(config.engine_concurrency, 4);
        assert_eq!(config.engine_threads, 2);
        assert_eq!(config.engine_timeout(), Duration::from_secs(30));
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.cache_max_items, 16);
        assert_eq!(config.language, "ind+eng");
        assert_eq!(config.fallback_language.as_deref(), Some("eng"));
        assert_eq!(config.min_text_chars, 10);
    }

    #[test]
    fn test_from_lookup_unset_keeps_defaults() {
        let config = PipelineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.zoom, PipelineConfig::default().zoom);
        assert_eq!(config.language, "eng");
        assert!(config.fallback_language.is_none());
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = PipelineConfig::from_lookup(lookup_from(&[("OCR_ZOOM", "fast")])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("OCR_ZOOM"));
    }

    #[test]
    fn test_from_lookup_rejects_out_of_range() {
        let err =
            PipelineConfig::from_lookup(lookup_from(&[("OCR_ZOOM", "-2.0")])).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_empty_fallback_means_none() {
        let config =
            PipelineConfig::from_lookup(lookup_from(&[("OCR_LANG_FALLBACK", "")])).unwrap();
        assert!(config.fallback_language.is_none());
    }
}
