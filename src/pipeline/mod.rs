//! Pipeline stages for résumé extraction.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested alone and swapped (another OCR engine, another model) without
//! touching its neighbours.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ ocr ──▶ canonicalize ──▶ llm/extract
//! (path/URL/gs) (pdfium) (PNG)  (tesseract)  (rules)        (record)
//! ```
//!
//! 1. [`input`]: resolve the user-supplied path, URL or `gs://` URI to bytes
//! 2. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 3. [`encode`]: PNG-encode each page for the recognizer
//! 4. [`ocr`]: recognise page text and concatenate it in page order
//! 5. [`canonicalize`]: deterministic rewrite rules that repair OCR noise
//! 6. [`llm`] and [`extract`]: one completion call, then tolerant parsing
//!    and validation against the schema template

pub mod canonicalize;
pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod render;
