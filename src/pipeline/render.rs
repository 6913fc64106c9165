//! PDF rasterisation: render every page of a document to a [`PageImage`] via
//! pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto the blocking pool so the
//! Tokio workers keep serving other requests during CPU-heavy rendering.
//!
//! ## Scale and cap
//!
//! Pages are scaled by `dpi / 72` (PDF user space is 72 units per inch), then
//! capped at `max_rendered_pixels` on the longest edge. A normal A4 résumé at
//! 300 DPI is about 2480 × 3508 px and never hits the cap; a scanned poster
//! does.

use crate::config::PipelineConfig;
use crate::document::{PageImage, RawDocument};
use crate::error::ResumeError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// PDF user-space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Bind to pdfium, either from `library_dir` or from the system library path.
pub fn bind_pdfium(library_dir: Option<&Path>) -> Result<Pdfium, ResumeError> {
    let bindings = match library_dir {
        Some(dir) => {
            let lib = Pdfium::pdfium_platform_library_name_at_path(dir);
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(lib)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ResumeError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Settings copied out of [`PipelineConfig`] for the blocking task.
#[derive(Debug, Clone)]
struct RenderSettings {
    dpi: u32,
    max_pixels: u32,
    library_dir: Option<PathBuf>,
}

impl From<&PipelineConfig> for RenderSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
            library_dir: config.pdfium_library_path.clone(),
        }
    }
}

/// Rasterise every page of `document`, in page order.
pub async fn render_pages(
    document: &RawDocument,
    config: &PipelineConfig,
) -> Result<Vec<PageImage>, ResumeError> {
    let bytes = document.as_bytes().to_vec();
    let settings = RenderSettings::from(config);

    tokio::task::spawn_blocking(move || render_pages_blocking(&bytes, &settings))
        .await
        .map_err(|e| ResumeError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_pages_blocking(
    bytes: &[u8],
    settings: &RenderSettings,
) -> Result<Vec<PageImage>, ResumeError> {
    let pdfium = bind_pdfium(settings.library_dir.as_deref())?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| ResumeError::Decode {
            detail: format!("pdfium could not open the document: {:?}", e),
        })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    if total_pages == 0 {
        return Err(ResumeError::Decode {
            detail: "document has no pages".to_string(),
        });
    }
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(settings.dpi as f32 / POINTS_PER_INCH)
        .set_maximum_width(settings.max_pixels as i32)
        .set_maximum_height(settings.max_pixels as i32);

    let mut results = Vec::with_capacity(total_pages);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| ResumeError::Decode {
                detail: format!("page {} could not be rasterised: {:?}", idx + 1, e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        results.push(PageImage::new(idx, image));
    }

    Ok(results)
}
