//! Image encoding: `PageImage` → PNG bytes for the recognizer.
//!
//! PNG is lossless. JPEG ringing around glyph edges measurably hurts
//! tesseract accuracy on small fonts, so pages never go through a lossy
//! format on their way to OCR.

use crate::document::PageImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG.
pub fn encode_png(page: &PageImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    page.pixels
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    debug!(
        "Encoded page {} ({}x{}) → {} PNG bytes",
        page.page_index + 1,
        page.width,
        page.height,
        buf.len()
    );
    Ok(buf)
}
