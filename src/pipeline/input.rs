//! Input handling: the uploaded document and the decision of which extractor reads it.
//!
//! Routing trusts the declared media type first and the filename extension
//! second, because browsers frequently send `application/octet-stream` (or
//! nothing at all) for DOCX and PDF uploads.

use crate::error::Doc2MdError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Canonical media type of a word-processor (OOXML) document.
pub const DOCX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Media type of a PDF document.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Prefix shared by every image media type.
pub const IMAGE_MEDIA_PREFIX: &str = "image/";

const GENERIC_MEDIA_TYPE: &str = "application/octet-stream";

/// One uploaded document, as delivered by the upload layer.
///
/// Owned by the dispatcher for a single conversion and dropped afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceDocument {
    bytes: Vec<u8>,
    declared_name: String,
    declared_media_type: String,
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("declared_name", &self.declared_name)
            .field("declared_media_type", &self.declared_media_type)
            .finish()
    }
}

impl SourceDocument {
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        declared_name: impl Into<String>,
        declared_media_type: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            declared_name: declared_name.into(),
            declared_media_type: declared_media_type.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn declared_name(&self) -> &str {
        &self.declared_name
    }

    pub fn declared_media_type(&self) -> &str {
        &self.declared_media_type
    }

    /// Give up ownership of the payload.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Which extractor a document is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Docx,
    Pdf,
    Image,
}

/// Pick the extractor for a document.
///
/// Order: DOCX by media type or `.docx`; PDF by media type or `.pdf`; image by
/// the `image/` media type prefix. A missing or generic media type is replaced
/// by the one guessed from the extension before the image check.
pub fn detect_kind(declared_name: &str, declared_media_type: &str) -> Result<DocumentKind, Doc2MdError> {
    let media_type = essence(declared_media_type);
    let name = declared_name.to_lowercase();

    if media_type == DOCX_MEDIA_TYPE || name.ends_with(".docx") {
        return Ok(DocumentKind::Docx);
    }
    if media_type == PDF_MEDIA_TYPE || name.ends_with(".pdf") {
        return Ok(DocumentKind::Pdf);
    }
    if media_type.starts_with(IMAGE_MEDIA_PREFIX) {
        return Ok(DocumentKind::Image);
    }

    if media_type.is_empty() || media_type == GENERIC_MEDIA_TYPE {
        let guessed = mime_guess::from_path(&name).first_raw().unwrap_or_default();
        debug!("No usable media type for '{}', guessed '{}'", declared_name, guessed);
        if guessed.starts_with(IMAGE_MEDIA_PREFIX) {
            return Ok(DocumentKind::Image);
        }
    }

    Err(Doc2MdError::UnsupportedFormat {
        media_type: declared_media_type.to_string(),
        file_name: declared_name.to_string(),
    })
}

/// Lower-cased media type without parameters (`Image/PNG; q=1` → `image/png`).
fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Download name for the converted document: final extension replaced by `.md`.
///
/// Directory components are dropped. A leading dot is part of the name, not
/// an extension, so `.notes` becomes `.notes.md`.
pub fn suggested_file_name(declared_name: &str) -> String {
    let base = declared_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let stem = match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    };
    if stem.is_empty() {
        "documento.md".to_string()
    } else {
        format!("{stem}.md")
    }
}

/// Read a local file into a [`SourceDocument`], enforcing `max_bytes`.
///
/// The media type is guessed from the extension; an unknown extension leaves
/// it empty so routing falls back to the name alone.
pub async fn read_source(path: &Path, max_bytes: u64) -> Result<SourceDocument, Doc2MdError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Doc2MdError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => Doc2MdError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if metadata.len() > max_bytes {
        return Err(Doc2MdError::InputTooLarge {
            name,
            size: metadata.len(),
            limit: max_bytes,
        });
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Doc2MdError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
    let media_type = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or_default()
        .to_string();

    debug!(
        "Read '{}' ({} bytes, media type '{}')",
        path.display(),
        bytes.len(),
        media_type
    );
    Ok(SourceDocument::new(bytes, name, media_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docx_by_media_type() {
        assert_eq!(detect_kind("upload", DOCX_MEDIA_TYPE).unwrap(), DocumentKind::Docx);
    }

    #[test]
    fn docx_by_extension_with_generic_type() {
        assert_eq!(
            detect_kind("Relatorio.DOCX", GENERIC_MEDIA_TYPE).unwrap(),
            DocumentKind::Docx
        );
        assert_eq!(detect_kind("relatorio.docx", "").unwrap(), DocumentKind::Docx);
    }

    #[test]
    fn pdf_by_media_type_or_extension() {
        assert_eq!(detect_kind("blob", "application/PDF").unwrap(), DocumentKind::Pdf);
        assert_eq!(detect_kind("scan.pdf", "").unwrap(), DocumentKind::Pdf);
    }

    #[test]
    fn image_by_prefix() {
        assert_eq!(detect_kind("photo", "image/jpeg").unwrap(), DocumentKind::Image);
        assert_eq!(
            detect_kind("photo", "image/png; charset=binary").unwrap(),
            DocumentKind::Image
        );
    }

    #[test]
    fn image_guessed_from_extension_when_type_is_generic() {
        assert_eq!(
            detect_kind("receipt.jpg", GENERIC_MEDIA_TYPE).unwrap(),
            DocumentKind::Image
        );
    }

    #[test]
    fn docx_wins_over_image_media_type() {
        assert_eq!(detect_kind("odd.docx", "image/png").unwrap(), DocumentKind::Docx);
    }

    #[test]
    fn unsupported_names_rejected_type() {
        let err = detect_kind("notes.txt", "text/plain").unwrap_err();
        match err {
            Doc2MdError::UnsupportedFormat { media_type, file_name } => {
                assert_eq!(media_type, "text/plain");
                assert_eq!(file_name, "notes.txt");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn declared_type_is_not_overridden_by_guess() {
        // An explicit non-image type is trusted even if the name looks like an image.
        assert!(detect_kind("fake.png", "text/plain").is_err());
    }

    #[test]
    fn suggested_name_replaces_last_extension() {
        assert_eq!(suggested_file_name("report.docx"), "report.md");
        assert_eq!(suggested_file_name("report.final.pdf"), "report.final.md");
        assert_eq!(suggested_file_name("README"), "README.md");
    }

    #[test]
    fn suggested_name_edge_cases() {
        assert_eq!(suggested_file_name("C:\\docs\\scan.png"), "scan.md");
        assert_eq!(suggested_file_name("uploads/a.b/photo"), "photo.md");
        assert_eq!(suggested_file_name(".notes"), ".notes.md");
        assert_eq!(suggested_file_name(""), "documento.md");
    }

    #[test]
    fn debug_hides_payload() {
        let doc = SourceDocument::new(vec![1, 2, 3], "a.pdf", PDF_MEDIA_TYPE);
        let dbg = format!("{doc:?}");
        assert!(dbg.contains("<3 bytes>"));
    }

    #[tokio::test]
    async fn read_source_missing_file() {
        let err = read_source(Path::new("/definitely/not/here.pdf"), 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, Doc2MdError::FileNotFound { .. }));
    }
}
