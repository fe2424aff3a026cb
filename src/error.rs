//! Error types for the doc2md library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`Doc2MdError`] is **fatal**: the document cannot be converted at all
//!   (unsupported format, malformed DOCX, OCR service rejected the call).
//!   Returned as `Err(Doc2MdError)` from the top-level `convert*` functions.
//!
//! * [`ExtractionOutcome`] is **non-fatal**. It is what a text-layer reader hands
//!   back. A `Failure` here is recovered into guidance Markdown by the PDF
//!   extractor and never reaches the caller.
//!
//! Expected absences of content (a scanned PDF, OCR without a credential,
//! OCR returning nothing) are not errors at all; they produce guidance
//! Markdown inside an `Ok`.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the doc2md library.
#[derive(Debug, Error)]
pub enum Doc2MdError {
    // ── Dispatch errors ───────────────────────────────────────────────────
    /// Neither the declared media type nor the file extension matched an extractor.
    #[error(
        "Unsupported format '{media_type}' for '{file_name}'\n\
Upload a PDF, an image, or a DOCX document."
    )]
    UnsupportedFormat {
        media_type: String,
        file_name: String,
    },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The word-processor archive or its markup could not be parsed.
    #[error("DOCX conversion failed: {detail}")]
    DocxExtraction { detail: String },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The document-text-detection API answered with a non-success status.
    #[error("Vision API returned {status}: {body}")]
    UpstreamOcr { status: u16, body: String },

    /// The API answered 2xx but flagged the image itself as failed.
    #[error("Vision API rejected the image: {message}")]
    OcrRejected { message: String },

    /// The API answered 2xx with a body that is not JSON.
    #[error("Vision API response could not be parsed: {detail}")]
    OcrResponseMalformed { detail: String },

    /// The request never produced an HTTP response (DNS, TLS, connection reset).
    #[error("Could not reach the Vision API: {detail}")]
    OcrTransport { detail: String },

    /// The transport gave up waiting for the Vision API.
    #[error("Vision API call timed out after {secs}s")]
    OcrTimeout { secs: u64 },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Input file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input exceeds the configured upload limit.
    #[error("Input '{name}' is {size} bytes; the limit is {limit} bytes")]
    InputTooLarge {
        name: String,
        size: u64,
        limit: u64,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Doc2MdError {
    /// Whether a caller may reasonably retry the same request.
    ///
    /// The pipeline never retries on its own. Quota (429) and server-side
    /// (5xx) rejections plus network-level failures are worth another try;
    /// everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Doc2MdError::UpstreamOcr { status, .. } => *status == 429 || *status >= 500,
            Doc2MdError::OcrTimeout { .. } | Doc2MdError::OcrTransport { .. } => true,
            _ => false,
        }
    }
}

/// What a text-layer reader produced for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// Text was read; it may be empty.
    Text(String),
    /// The reader could not process the document.
    Failure(String),
}
