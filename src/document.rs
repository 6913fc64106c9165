//! Value types flowing through the pipeline.
//!
//! ```text
//! RawDocument ──▶ PageImage* ──▶ RawText ──▶ CanonicalText ──▶ StructuredRecord
//! ```
//!
//! Each type is a thin newtype so stage signatures say which form of the text
//! they accept; a `CanonicalText` can only be produced by
//! [`crate::pipeline::canonicalize`].

use image::DynamicImage;
use std::fmt;

/// Opaque bytes of a multi-page document, as retrieved from storage.
#[derive(Clone, PartialEq, Eq)]
pub struct RawDocument(Vec<u8>);

impl RawDocument {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First four bytes, zero-padded, for error messages.
    pub fn magic(&self) -> [u8; 4] {
        let mut magic = [0u8; 4];
        for (dst, src) in magic.iter_mut().zip(self.0.iter()) {
            *dst = *src;
        }
        magic
    }

    /// Whether the bytes start with the `%PDF` signature.
    pub fn looks_like_pdf(&self) -> bool {
        self.0.starts_with(b"%PDF")
    }
}

impl fmt::Debug for RawDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawDocument")
            .field("len", &self.0.len())
            .field("magic", &self.magic())
            .finish()
    }
}

impl From<Vec<u8>> for RawDocument {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// One rasterised page. Dropped as soon as its text has been recognised.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 0-based position in the document.
    pub page_index: usize,
    pub width: u32,
    pub height: u32,
    pub pixels: DynamicImage,
}

impl PageImage {
    pub fn new(page_index: usize, pixels: DynamicImage) -> Self {
        Self {
            page_index,
            width: pixels.width(),
            height: pixels.height(),
            pixels,
        }
    }
}

/// Concatenated OCR output of every page, in page order. No structure guarantees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawText(String);

impl RawText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn push_page(&mut self, page_text: &str) {
        self.0.push_str(page_text);
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for RawText {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Single-line, lowercase, whitespace-collapsed text ready for the LLM.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct CanonicalText(String);

impl CanonicalText {
    pub(crate) fn from_normalised(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn pdf_magic_detection() {
        assert!(RawDocument::new(b"%PDF-1.7\n...".to_vec()).looks_like_pdf());
        assert!(!RawDocument::new(b"PK\x03\x04".to_vec()).looks_like_pdf());
        assert!(!RawDocument::new(Vec::new()).looks_like_pdf());
    }

    #[test]
    fn magic_is_zero_padded() {
        assert_eq!(RawDocument::new(b"%P".to_vec()).magic(), [b'%', b'P', 0, 0]);
    }

    #[test]
    fn page_image_records_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, Rgb([255, 255, 255])));
        let page = PageImage::new(3, img);
        assert_eq!((page.width, page.height, page.page_index), (40, 20, 3));
    }

    #[test]
    fn raw_text_concatenates_pages() {
        let mut raw = RawText::default();
        raw.push_page("page one\n");
        raw.push_page("page two\n");
        assert_eq!(raw.as_str(), "page one\npage two\n");
    }
}
