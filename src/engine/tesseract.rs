//! Tesseract subprocess engine.
//!
//! Invokes the `tesseract` binary per page (`stdin` → `stdout`), the same way
//! the service this crate grew out of drove it. The engine-internal thread
//! cap is applied per child through `OMP_THREAD_LIMIT`, from the process-wide
//! configuration; it is not a per-call parameter. `kill_on_drop` terminates
//! the child when the invoker abandons a timed-out call.

use super::OcrEngine;
use crate::error::{PipelineError, Result};
use crate::types::PageImage;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Default page segmentation mode: assume a uniform block of text.
const DEFAULT_PSM: u8 = 6;
/// Default engine mode: LSTM only.
const DEFAULT_OEM: u8 = 1;

/// OCR engine backed by the external `tesseract` binary.
pub struct TesseractEngine {
    binary: PathBuf,
    psm: u8,
    oem: u8,
    thread_limit: usize,
}

impl TesseractEngine {
    /// Engine with default binary lookup (`tesseract` on `PATH`) and the
    /// given engine-internal thread cap.
    pub fn new(thread_limit: usize) -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            psm: DEFAULT_PSM,
            oem: DEFAULT_OEM,
            thread_limit: thread_limit.max(1),
        }
    }

    pub fn with_binary<P: Into<PathBuf>>(mut self, binary: P) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_psm(mut self, psm: u8) -> Self {
        self.psm = psm;
        self
    }

    pub fn with_oem(mut self, oem: u8) -> Self {
        self.oem = oem;
        self
    }

    fn command(&self, language: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("stdin")
            .arg("stdout")
            .args(["-l", language])
            .args(["--oem", &self.oem.to_string()])
            .args(["--psm", &self.psm.to_string()])
            .env("OMP_THREAD_LIMIT", self.thread_limit.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, page: &PageImage, language: &str) -> Result<String> {
        let mut child = self.command(language).spawn().map_err(|e| {
            PipelineError::engine(page.index, format!("failed to spawn tesseract: {e}"))
        })?;

        // stdin is piped above, so take() cannot return None.
        let mut stdin = child.stdin.take().ok_or_else(|| {
            PipelineError::engine(page.index, "tesseract child has no stdin handle")
        })?;
        stdin.write_all(&page.png).await.map_err(|e| {
            PipelineError::engine(page.index, format!("failed to feed page image: {e}"))
        })?;
        stdin.shutdown().await.map_err(|e| {
            PipelineError::engine(page.index, format!("failed to close engine stdin: {e}"))
        })?;
        drop(stdin);

        let output = child.wait_with_output().await.map_err(|e| {
            PipelineError::engine(page.index, format!("failed to collect tesseract output: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::engine(
                page.index,
                format!(
                    "tesseract exited with {}: {}",
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        tracing::debug!(
            page = page.index,
            language,
            bytes = output.stdout.len(),
            "tesseract call completed"
        );
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    fn name(&self) -> &'static str {
        "tesseract"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageImage {
        PageImage {
            index: 1,
            width: 4,
            height: 4,
            png: vec![0u8; 32],
        }
    }

    #[test]
    fn test_thread_limit_floor() {
        let engine = TesseractEngine::new(0);
        assert_eq!(engine.thread_limit, 1);
    }

    #[test]
    fn test_builder_overrides() {
        let engine = TesseractEngine::new(2)
            .with_binary("/opt/tesseract/bin/tesseract")
            .with_psm(3)
            .with_oem(0);
        assert_eq!(engine.binary, PathBuf::from("/opt/tesseract/bin/tesseract"));
        assert_eq!(engine.psm, 3);
        assert_eq!(engine.oem, 0);
        assert_eq!(engine.thread_limit, 2);
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_failure() {
        let engine = TesseractEngine::new(1).with_binary("/nonexistent/tesseract-binary");
        let err = engine.recognize(&page(), "eng").await.unwrap_err();
        match err {
            PipelineError::EngineFailure { page, message } => {
                assert_eq!(page, 1);
                assert!(message.contains("failed to spawn tesseract"));
            }
            other => panic!("expected EngineFailure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_command_output_is_trimmed() {
        use std::os::unix::fs::PermissionsExt;

        // Fake engine: swallow stdin, print text with trailing whitespace.
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-tesseract");
        std::fs::write(&script, "#!/bin/sh\ncat > /dev/null\nprintf 'recognized text\\n\\n'\n")
            .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = TesseractEngine::new(1).with_binary(&script);
        let text = engine.recognize(&page(), "eng").await.unwrap();
        assert_eq!(text, "recognized text");
    }

    #[tokio::test]
    async fn test_failing_command_is_engine_failure() {
        // `false` exits nonzero immediately, standing in for an engine error
        // without requiring tesseract on the test host. Depending on timing
        // the failure surfaces either as a broken stdin pipe or as the
        // nonzero exit status; both map to EngineFailure on the right page.
        let engine = TesseractEngine::new(1).with_binary("false");
        let err = engine.recognize(&page(), "eng").await.unwrap_err();
        assert!(matches!(err, PipelineError::EngineFailure { page: 1, .. }));
    }
}
