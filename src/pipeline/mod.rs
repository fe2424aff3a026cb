//! Pipeline stages for document-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step. The dispatcher
//! in [`crate::convert`] picks one extraction path per document kind; every
//! path ends in Markdown text.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ docx ───────────────────────────▶ (html2md)
//! input ─────┼──▶ pdf  ──────────────▶ normalize (join lines)
//! (kind)     └──▶ encode ──▶ ocr ────▶ normalize (keep lines)
//!                 (base64)  (Vision)
//! ```
//!
//! 1. [`input`]:     classify the upload by media type and file name, derive
//!    the suggested `.md` name, read files from disk with a size limit
//! 2. [`docx`]:      unzip `word/document.xml`, emit HTML, convert to Markdown
//! 3. [`pdf`]:       read the embedded text layer via pdfium in
//!    `spawn_blocking`; fall back to a fixed guidance document
//! 4. [`encode`]:    base64-wrap image bytes for the OCR request body
//! 5. [`ocr`]:       document text detection over HTTPS; the only stage with
//!    network I/O
//! 6. [`normalize`]: deterministic whitespace cleanup shared by PDF and OCR

pub mod docx;
pub mod encode;
pub mod input;
pub mod normalize;
pub mod ocr;
pub mod pdf;
