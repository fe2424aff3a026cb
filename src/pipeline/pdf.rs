//! PDF text layer: read embedded text via pdfium, or explain why there is none.
//!
//! ## Why swallow every error here?
//!
//! A PDF without a text layer is the common case for scanned paperwork, and
//! pdfium reports it in several ways (no text, a parse error on an odd
//! producer's output, an encrypted stream). None of these should fail the
//! upload; they all end in the same guidance document telling the user to
//! send the pages as images for OCR.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library with thread-local state and synchronous calls.
//! `tokio::task::spawn_blocking` keeps it off the async worker threads.
//!
//! ## One binding per process
//!
//! `FPDF_InitLibrary` and `FPDF_DestroyLibrary` act on process-global state,
//! so creating and dropping a `Pdfium` per call breaks concurrent
//! conversions. The library is bound once, on the first PDF, and kept in a
//! static until exit. Document access goes through its mutex. The library
//! path of whichever [`PdfiumTextLayer`] gets there first wins; a failed
//! bind is remembered too, and every later PDF gets the same failure.

use crate::error::ExtractionOutcome;
use crate::pipeline::normalize::{normalize_with, LineBreaks};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::{debug, info, warn};

/// Process-wide pdfium binding, or the reason binding failed.
static PDFIUM: OnceLock<Result<Mutex<Pdfium>, String>> = OnceLock::new();

/// Markdown returned when a PDF has no extractable text.
pub const PDF_NO_TEXT_GUIDANCE: &str = "# PDF sem texto extraível\n\
\n\
> Parece digitalizado (imagem). Envie as páginas como PNG/JPG para OCR,\n\
> ou depois ativamos o fluxo de OCR de PDF via GCS.";

/// Something that can read the text layer of a PDF.
///
/// Production uses [`PdfiumTextLayer`]; tests substitute doubles.
#[async_trait]
pub trait PdfTextLayer: Send + Sync {
    /// Read all page text. Never errors: failures are reported as
    /// [`ExtractionOutcome::Failure`].
    async fn read_text(&self, bytes: Vec<u8>) -> ExtractionOutcome;
}

/// Text-layer reader backed by the pdfium library.
///
/// The library is bound lazily on the first call, inside the blocking pool,
/// so a missing pdfium only affects PDF uploads and surfaces as a
/// recoverable failure. See the module docs for how the binding is shared.
#[derive(Debug, Clone, Default)]
pub struct PdfiumTextLayer {
    library_path: Option<PathBuf>,
}

impl PdfiumTextLayer {
    /// Use the pdfium library at `library_path` (the library file or the
    /// directory holding it), or the system library when None.
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }
}

#[async_trait]
impl PdfTextLayer for PdfiumTextLayer {
    async fn read_text(&self, bytes: Vec<u8>) -> ExtractionOutcome {
        let library_path = self.library_path.clone();
        match tokio::task::spawn_blocking(move || read_text_blocking(library_path, &bytes)).await {
            Ok(Ok(text)) => ExtractionOutcome::Text(text),
            Ok(Err(detail)) => ExtractionOutcome::Failure(detail),
            Err(e) => ExtractionOutcome::Failure(format!("Text-layer task panicked: {e}")),
        }
    }
}

/// The shared pdfium instance, binding it on first use.
fn shared_pdfium(library_path: Option<&Path>) -> Result<&'static Mutex<Pdfium>, String> {
    PDFIUM
        .get_or_init(|| {
            let bindings = match library_path {
                Some(dir) if dir.is_dir() => {
                    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                }
                Some(path) => Pdfium::bind_to_library(path),
                None => Pdfium::bind_to_system_library(),
            }
            .map_err(|e| format!("Failed to bind to pdfium: {e:?}"))?;
            match library_path {
                Some(path) => info!("pdfium bound from {}", path.display()),
                None => info!("pdfium bound from the system library"),
            }
            Ok(Mutex::new(Pdfium::new(bindings)))
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// Blocking implementation of text-layer extraction.
fn read_text_blocking(library_path: Option<PathBuf>, bytes: &[u8]) -> Result<String, String> {
    let pdfium = shared_pdfium(library_path.as_deref())?
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| format!("Failed to open PDF: {e:?}"))?;

    let pages = document.pages();
    debug!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| format!("Failed to read text of page {}: {e:?}", idx + 1))?;
        texts.push(text.all());
    }

    Ok(texts.join("\n\n"))
}

/// Convert a PDF to Markdown from its text layer.
///
/// Returns [`PDF_NO_TEXT_GUIDANCE`] when the text layer is empty or could
/// not be read; otherwise the normalised text.
pub async fn extract_pdf(reader: &dyn PdfTextLayer, bytes: Vec<u8>) -> String {
    let size = bytes.len();
    let text = match reader.read_text(bytes).await {
        ExtractionOutcome::Text(text) => text,
        ExtractionOutcome::Failure(reason) => {
            warn!("PDF text layer unreadable ({} bytes): {}", size, reason);
            String::new()
        }
    };

    if text.trim().is_empty() {
        info!("PDF has no extractable text, returning guidance");
        return PDF_NO_TEXT_GUIDANCE.to_string();
    }

    normalize_with(&text, LineBreaks::Join)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLayer(ExtractionOutcome);

    #[async_trait]
    impl PdfTextLayer for FixedLayer {
        async fn read_text(&self, _bytes: Vec<u8>) -> ExtractionOutcome {
            self.0.clone()
        }
    }

    #[test]
    fn guidance_has_three_parts() {
        let lines: Vec<&str> = PDF_NO_TEXT_GUIDANCE.lines().collect();
        assert_eq!(lines[0], "# PDF sem texto extraível");
        assert_eq!(lines[1], "");
        assert!(lines[2..].iter().all(|l| l.starts_with("> ")));
        assert!(PDF_NO_TEXT_GUIDANCE.contains("Parece digitalizado"));
    }

    #[tokio::test]
    async fn whitespace_text_yields_guidance() {
        let layer = FixedLayer(ExtractionOutcome::Text(" \n\n\t ".into()));
        assert_eq!(extract_pdf(&layer, vec![]).await, PDF_NO_TEXT_GUIDANCE);
    }

    #[tokio::test]
    async fn failure_yields_guidance() {
        let layer = FixedLayer(ExtractionOutcome::Failure("encrypted".into()));
        assert_eq!(extract_pdf(&layer, b"%PDF-1.4".to_vec()).await, PDF_NO_TEXT_GUIDANCE);
    }

    #[tokio::test]
    async fn text_is_normalised() {
        let layer = FixedLayer(ExtractionOutcome::Text(
            "Title line\r\nwrapped here\n\n\nNext paragraph\n".into(),
        ));
        assert_eq!(
            extract_pdf(&layer, vec![]).await,
            "Title line wrapped here\n\nNext paragraph"
        );
    }

    #[test]
    fn binding_is_shared_across_calls() {
        let first = shared_pdfium(None).map(|m| m as *const Mutex<Pdfium>);
        let second = shared_pdfium(Some(Path::new("/nonexistent/libpdfium.so")))
            .map(|m| m as *const Mutex<Pdfium>);
        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reads_through_one_layer() {
        let layer = PdfiumTextLayer::new(None);
        let (a, b, c) = tokio::join!(
            layer.read_text(b"not a pdf".to_vec()),
            layer.read_text(b"%PDF-1.4 truncated".to_vec()),
            layer.read_text(Vec::new()),
        );
        for outcome in [a, b, c] {
            assert!(
                matches!(outcome, ExtractionOutcome::Failure(_)),
                "got: {outcome:?}"
            );
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_conversions_all_get_guidance() {
        let layer = PdfiumTextLayer::new(None);
        let (a, b) = tokio::join!(
            extract_pdf(&layer, b"garbage one".to_vec()),
            extract_pdf(&layer, b"garbage two".to_vec()),
        );
        assert_eq!(a, PDF_NO_TEXT_GUIDANCE);
        assert_eq!(b, PDF_NO_TEXT_GUIDANCE);
    }
}
