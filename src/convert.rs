//! Conversion entry points: one document in, one Markdown document out.
//!
//! [`Converter`] owns the two external seams (the PDF text layer and the OCR
//! transport) so a long-lived service builds them once. The free functions
//! [`convert`], [`convert_file`], [`convert_to_file`] and [`convert_sync`]
//! build a converter per call from a [`ConversionConfig`], which means a new
//! HTTP client (and connection pool) for every OCR request. They suit
//! one-shot use such as the CLI. Services handling many uploads should build
//! one [`Converter`] and share it; it is cheap to clone and reuses its client.

use crate::config::ConversionConfig;
use crate::error::Doc2MdError;
use crate::output::ConversionResult;
use crate::pipeline::input::{self, DocumentKind, SourceDocument};
use crate::pipeline::ocr::{ReqwestTransport, VisionTransport};
use crate::pipeline::pdf::{PdfTextLayer, PdfiumTextLayer};
use crate::pipeline::{docx, encode, ocr, pdf};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Routes documents to the matching extractor.
#[derive(Clone)]
pub struct Converter {
    config: ConversionConfig,
    pdf_text_layer: Arc<dyn PdfTextLayer>,
    vision_transport: Arc<dyn VisionTransport>,
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Converter {
    /// Build a converter with the production pdfium reader and HTTPS transport.
    ///
    /// Nothing is loaded or connected here. The HTTP client is built on this
    /// converter's first OCR call and reused by it and its clones; pdfium is
    /// bound once per process on the first PDF.
    pub fn new(config: ConversionConfig) -> Self {
        let pdf_text_layer = Arc::new(PdfiumTextLayer::new(config.pdfium_library_path.clone()));
        let vision_transport = Arc::new(ReqwestTransport::new(
            config.vision_endpoint.clone(),
            Duration::from_secs(config.ocr_timeout_secs),
        ));
        Self {
            config,
            pdf_text_layer,
            vision_transport,
        }
    }

    /// Replace the PDF text-layer reader.
    pub fn with_pdf_text_layer(mut self, layer: Arc<dyn PdfTextLayer>) -> Self {
        self.pdf_text_layer = layer;
        self
    }

    /// Replace the OCR transport.
    pub fn with_vision_transport(mut self, transport: Arc<dyn VisionTransport>) -> Self {
        self.vision_transport = transport;
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert one document to Markdown.
    ///
    /// # Errors
    /// - [`Doc2MdError::UnsupportedFormat`] when no extractor matches
    /// - [`Doc2MdError::DocxExtraction`] for a malformed DOCX
    /// - [`Doc2MdError::UpstreamOcr`] and the other OCR variants when the
    ///   OCR call fails
    ///
    /// A PDF without text and an image without OCR credentials are not
    /// errors; they convert to guidance Markdown.
    pub async fn convert(&self, source: SourceDocument) -> Result<ConversionResult, Doc2MdError> {
        let start = Instant::now();
        let kind = input::detect_kind(source.declared_name(), source.declared_media_type())?;
        let suggested_file_name = input::suggested_file_name(source.declared_name());
        info!(
            "Converting '{}' as {:?} ({} bytes)",
            source.declared_name(),
            kind,
            source.bytes().len()
        );

        let bytes = source.into_bytes();
        let markdown = match kind {
            DocumentKind::Docx => tokio::task::spawn_blocking(move || docx::extract_docx(&bytes))
                .await
                .map_err(|e| Doc2MdError::Internal(format!("DOCX task panicked: {e}")))??,
            DocumentKind::Pdf => pdf::extract_pdf(self.pdf_text_layer.as_ref(), bytes).await,
            DocumentKind::Image => {
                let image_base64 = encode::encode_image(&bytes);
                ocr::extract_ocr(
                    &image_base64,
                    self.config.ocr_credential(),
                    self.vision_transport.as_ref(),
                    &self.config.ocr_language_hints,
                )
                .await?
            }
        };

        info!(
            "Converted to '{}': {} chars in {}ms",
            suggested_file_name,
            markdown.len(),
            start.elapsed().as_millis()
        );
        Ok(ConversionResult {
            markdown,
            suggested_file_name,
            kind,
        })
    }

    /// Read a local file and convert it.
    pub async fn convert_file(&self, path: impl AsRef<Path>) -> Result<ConversionResult, Doc2MdError> {
        let source = input::read_source(path.as_ref(), self.config.max_input_bytes).await?;
        self.convert(source).await
    }
}

/// Convert one in-memory document with a converter built from `config`.
///
/// Builds a fresh [`Converter`] each call; hold one instead when converting
/// repeatedly.
pub async fn convert(
    source: SourceDocument,
    config: &ConversionConfig,
) -> Result<ConversionResult, Doc2MdError> {
    Converter::new(config.clone()).convert(source).await
}

/// Convert a local file.
///
/// Like [`convert`], this builds a throwaway [`Converter`].
///
/// # Example
/// ```rust,no_run
/// use doc2md::{convert_file, ConversionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let result = convert_file("relatorio.docx", &ConversionConfig::default()).await?;
/// println!("{}", result.markdown);
/// # Ok(())
/// # }
/// ```
pub async fn convert_file(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionResult, Doc2MdError> {
    Converter::new(config.clone()).convert_file(path).await
}

/// Convert a local file and write the Markdown to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionResult, Doc2MdError> {
    let result = convert_file(input_path, config).await?;
    write_markdown(output_path.as_ref(), &result.markdown).await?;
    Ok(result)
}

/// Write Markdown atomically, creating parent directories as needed.
pub async fn write_markdown(path: &Path, markdown: &str) -> Result<(), Doc2MdError> {
    let write_err = |e| Doc2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    debug!("Wrote {} bytes to {}", markdown.len(), path.display());
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime and converter internally.
pub fn convert_sync(
    source: SourceDocument,
    config: &ConversionConfig,
) -> Result<ConversionResult, Doc2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Doc2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(source, config))
}
