//! Conversion output and the helpers a delivery layer needs to serve it.

use crate::pipeline::input::DocumentKind;
use serde::{Deserialize, Serialize};

/// Content type under which converted Markdown is served.
pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

/// Result of converting one document.
///
/// `markdown` is always a complete document. For scanned PDFs or disabled
/// OCR it is a short guidance placeholder rather than extracted content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// The rendered Markdown.
    pub markdown: String,
    /// File name to offer for download, always ending in `.md`.
    pub suggested_file_name: String,
    /// Which extractor produced `markdown`.
    pub kind: DocumentKind,
}

impl ConversionResult {
    /// Value for a `Content-Disposition` header offering the result as a download.
    ///
    /// Quotes and backslashes in the file name are escaped so the header
    /// stays well-formed.
    pub fn content_disposition(&self) -> String {
        let escaped = self
            .suggested_file_name
            .replace('\\', "\\\\")
            .replace('"', "\\\"");
        format!("attachment; filename=\"{escaped}\"")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str) -> ConversionResult {
        ConversionResult {
            markdown: "# Hi".into(),
            suggested_file_name: name.into(),
            kind: DocumentKind::Pdf,
        }
    }

    #[test]
    fn content_disposition_names_file() {
        assert_eq!(
            result("report.md").content_disposition(),
            "attachment; filename=\"report.md\""
        );
    }

    #[test]
    fn content_disposition_escapes_quotes() {
        assert_eq!(
            result("a\"b.md").content_disposition(),
            "attachment; filename=\"a\\\"b.md\""
        );
    }

    #[test]
    fn serialises_kind_lowercase() {
        let json = serde_json::to_string(&result("x.md")).unwrap();
        assert!(json.contains("\"kind\":\"pdf\""), "got: {json}");
    }
}
