//! Rasterizer/OCR adapter: [`RawDocument`] → [`RawText`].
//!
//! The adapter is a composition of two seams:
//!
//! - [`Rasterizer`] turns the document into page images. The production one,
//!   [`PdfiumRasterizer`], wraps [`crate::pipeline::render`].
//! - [`TextRecognizer`] turns one page image into text. The production one,
//!   [`TesseractRecognizer`], shells out to the `tesseract` CLI.
//!
//! Pages are recognised one after another in page order, and their texts are
//! concatenated without separators, exactly as the recognizer returned them.
//! The canonicalizer deals with whatever layout noise that leaves behind.

use crate::config::PipelineConfig;
use crate::document::{PageImage, RawDocument, RawText};
use crate::error::ResumeError;
use crate::pipeline::{encode, input, render};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Turns document bytes into raw text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, document: &RawDocument) -> Result<RawText, ResumeError>;
}

/// Turns document bytes into page images.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, document: &RawDocument) -> Result<Vec<PageImage>, ResumeError>;
}

/// Recognises the text on one page image.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, page: &PageImage) -> Result<String, ResumeError>;
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// [`Rasterizer`] backed by pdfium.
pub struct PdfiumRasterizer {
    config: PipelineConfig,
}

impl PdfiumRasterizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(&self, document: &RawDocument) -> Result<Vec<PageImage>, ResumeError> {
        render::render_pages(document, &self.config).await
    }
}

// ── tesseract ────────────────────────────────────────────────────────────

/// [`TextRecognizer`] wrapping the `tesseract` CLI tool.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    command: PathBuf,
    language: String,
    page_segmentation_mode: u8,
    dpi: u32,
}

impl TesseractRecognizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            command: config.tesseract_command.clone(),
            language: config.ocr_language.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
            dpi: config.dpi,
        }
    }

    /// Arguments after the input path. Output goes to stdout.
    fn args(&self) -> Vec<String> {
        vec![
            "stdout".to_string(),
            "--psm".to_string(),
            self.page_segmentation_mode.to_string(),
            "--dpi".to_string(),
            self.dpi.to_string(),
            "-l".to_string(),
            self.language.clone(),
        ]
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    #[instrument(level = "debug", skip_all, fields(page = page.page_index + 1))]
    async fn recognize(&self, page: &PageImage) -> Result<String, ResumeError> {
        let page_no = page.page_index + 1;
        let failed = |detail: String| ResumeError::Recognition {
            page: page_no,
            detail,
        };

        let png = encode::encode_png(page).map_err(|e| failed(format!("cannot encode page: {e}")))?;

        let tmpdir = tempfile::TempDir::with_prefix("tesseract")
            .map_err(|e| failed(format!("cannot create temp dir: {e}")))?;
        let input_path = tmpdir.path().join("input.png");
        tokio::fs::write(&input_path, &png)
            .await
            .map_err(|e| failed(format!("cannot write tesseract input file: {e}")))?;

        let output = Command::new(&self.command)
            .arg(&input_path)
            .args(self.args())
            .output()
            .await
            .map_err(|e| failed(format!("cannot run {}: {e}", self.command.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failed(format!(
                "{} exited with {}: {}",
                self.command.display(),
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| failed(format!("output is not UTF-8: {e}")))
    }
}

// ── adapter ──────────────────────────────────────────────────────────────

/// The production [`TextExtractor`]: rasterise, then recognise page by page.
pub struct OcrAdapter {
    rasterizer: Arc<dyn Rasterizer>,
    recognizer: Arc<dyn TextRecognizer>,
}

impl OcrAdapter {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            rasterizer,
            recognizer,
        }
    }

    /// pdfium + tesseract, both configured from `config`.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            Arc::new(PdfiumRasterizer::new(config)),
            Arc::new(TesseractRecognizer::new(config)),
        )
    }
}

#[async_trait]
impl TextExtractor for OcrAdapter {
    async fn extract(&self, document: &RawDocument) -> Result<RawText, ResumeError> {
        input::ensure_pdf(document)?;

        let start = Instant::now();
        let pages = self.rasterizer.rasterize(document).await?;

        let mut text = RawText::default();
        for page in &pages {
            let page_text = self.recognizer.recognize(page).await?;
            debug!(
                "Page {}: {} chars recognised",
                page.page_index + 1,
                page_text.len()
            );
            text.push_page(&page_text);
        }

        info!(
            "OCR complete: {} pages, {} chars in {:?}",
            pages.len(),
            text.as_str().len(),
            start.elapsed()
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};
    use std::sync::Mutex;

    struct FixedPages(usize);

    #[async_trait]
    impl Rasterizer for FixedPages {
        async fn rasterize(&self, _: &RawDocument) -> Result<Vec<PageImage>, ResumeError> {
            Ok((0..self.0)
                .map(|i| PageImage::new(i, DynamicImage::ImageRgba8(RgbaImage::new(4, 4))))
                .collect())
        }
    }

    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<usize>>,
        fail_on: Option<usize>,
    }

    #[async_trait]
    impl TextRecognizer for Echo {
        async fn recognize(&self, page: &PageImage) -> Result<String, ResumeError> {
            self.seen.lock().unwrap().push(page.page_index);
            if self.fail_on == Some(page.page_index) {
                return Err(ResumeError::Recognition {
                    page: page.page_index + 1,
                    detail: "engine crashed".into(),
                });
            }
            Ok(format!("page{}\n", page.page_index))
        }
    }

    fn pdf() -> RawDocument {
        RawDocument::new(b"%PDF-1.7\n...".to_vec())
    }

    #[tokio::test]
    async fn pages_are_concatenated_in_order() {
        let echo = Arc::new(Echo::default());
        let adapter = OcrAdapter::new(Arc::new(FixedPages(3)), echo.clone());
        let text = adapter.extract(&pdf()).await.unwrap();
        assert_eq!(text.as_str(), "page0\npage1\npage2\n");
        assert_eq!(*echo.seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn non_pdf_is_a_decode_error() {
        let adapter = OcrAdapter::new(Arc::new(FixedPages(1)), Arc::new(Echo::default()));
        let err = adapter
            .extract(&RawDocument::new(b"PK\x03\x04zip".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ResumeError::Decode { .. }));
    }

    #[tokio::test]
    async fn recognition_failure_stops_the_run() {
        let echo = Arc::new(Echo {
            fail_on: Some(1),
            ..Echo::default()
        });
        let adapter = OcrAdapter::new(Arc::new(FixedPages(3)), echo.clone());
        let err = adapter.extract(&pdf()).await.unwrap_err();
        assert!(matches!(err, ResumeError::Recognition { page: 2, .. }));
        assert_eq!(*echo.seen.lock().unwrap(), vec![0, 1], "page 3 never attempted");
    }

    #[test]
    fn tesseract_args_carry_psm_and_language() {
        let config = PipelineConfig::builder()
            .page_segmentation_mode(6)
            .ocr_language("eng+ind")
            .dpi(200)
            .build()
            .unwrap();
        let args = TesseractRecognizer::new(&config).args();
        assert_eq!(args, vec!["stdout", "--psm", "6", "--dpi", "200", "-l", "eng+ind"]);
    }

    #[tokio::test]
    async fn missing_tesseract_binary_is_a_recognition_error() {
        let config = PipelineConfig::builder()
            .tesseract_command("/nonexistent/tesseract-binary")
            .build()
            .unwrap();
        let page = PageImage::new(0, DynamicImage::ImageRgba8(RgbaImage::new(2, 2)));
        let err = TesseractRecognizer::new(&config)
            .recognize(&page)
            .await
            .unwrap_err();
        assert!(matches!(err, ResumeError::Recognition { page: 1, .. }));
    }
}
