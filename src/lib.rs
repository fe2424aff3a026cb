//! # doc2md
//!
//! Convert uploaded documents (DOCX, PDF, images) to normalised Markdown.
//!
//! ## Why this crate?
//!
//! Users upload whatever they have: a Word report, a PDF exported from a
//! spreadsheet, a phone photo of a receipt. Each needs a different extractor,
//! but the caller wants one thing back: a Markdown document it can offer for
//! download. This crate picks the extractor, runs it, and always returns
//! Markdown, falling back to short guidance documents when a PDF is a scan
//! or OCR is not configured.
//!
//! ## Pipeline Overview
//!
//! ```text
//! SourceDocument { bytes, name, media type }
//!  │
//!  ├─ 1. Detect     DOCX / PDF / image from media type and extension
//!  ├─ 2. Extract    DOCX → HTML → Markdown
//!  │                PDF  → pdfium text layer (spawn_blocking) → normalise
//!  │                image → base64 → Vision document text detection → normalise
//!  └─ 3. Output     ConversionResult { markdown, suggested_file_name, kind }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc2md::{convert, ConversionConfig, SourceDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .maybe_ocr_api_key(std::env::var("GOOGLE_VISION_API_KEY").ok())
//!         .build()?;
//!     let bytes = std::fs::read("recibo.png")?;
//!     let source = SourceDocument::new(bytes, "recibo.png", "image/png");
//!     let result = convert(source, &config).await?;
//!     println!("{} → {}", result.suggested_file_name, result.markdown);
//!     Ok(())
//! }
//! ```
//!
//! A service converting many uploads should keep one [`Converter`] so the
//! OCR HTTP client and its connections are reused:
//!
//! ```rust,no_run
//! use doc2md::{ConversionConfig, Converter, SourceDocument};
//!
//! # async fn handle(uploads: Vec<SourceDocument>) -> Result<(), doc2md::Doc2MdError> {
//! let converter = Converter::new(ConversionConfig::default());
//! for upload in uploads {
//!     let result = converter.convert(upload).await?;
//!     println!("{}", result.suggested_file_name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2md` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! doc2md = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! PDF text extraction binds the pdfium shared library on the first PDF,
//! from [`ConversionConfig::pdfium_library_path`] or the system library
//! path, and keeps that binding for the life of the process. If
//! pdfium is missing, PDFs convert to the "no extractable text" guidance
//! instead of failing.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert, convert_file, convert_sync, convert_to_file, Converter};
pub use error::{Doc2MdError, ExtractionOutcome};
pub use output::{ConversionResult, MARKDOWN_CONTENT_TYPE};
pub use pipeline::input::{DocumentKind, SourceDocument};
pub use pipeline::ocr::{VisionTransport, OCR_DISABLED_MESSAGE, OCR_NO_TEXT_MESSAGE};
pub use pipeline::pdf::{PdfTextLayer, PDF_NO_TEXT_GUIDANCE};
