//! Configuration types for document-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The OCR credential lives here rather
//! than being looked up from the environment inside the pipeline: the
//! surrounding service resolves it once and threads it through.

use crate::error::Doc2MdError;
use std::fmt;
use std::path::PathBuf;

/// Default document-text-detection endpoint.
pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Name of the configuration key that enables OCR.
pub const OCR_API_KEY_VAR: &str = "GOOGLE_VISION_API_KEY";

/// Configuration for a conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use doc2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .ocr_api_key("my-key")
///     .ocr_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert!(config.ocr_enabled());
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// API key for the document-text-detection service. Default: None.
    ///
    /// Absence is a normal state: image uploads then yield a fixed
    /// "OCR disabled" heading instead of an error.
    pub ocr_api_key: Option<String>,

    /// Endpoint of the document-text-detection API. Default: [`DEFAULT_VISION_ENDPOINT`].
    pub vision_endpoint: String,

    /// Timeout for one OCR HTTP call in seconds. Default: 90.
    pub ocr_timeout_secs: u64,

    /// Language hints forwarded as `imageContext.languageHints`. Default: empty (omitted).
    pub ocr_language_hints: Vec<String>,

    /// Path to the pdfium shared library. If None, the system library is used.
    pub pdfium_library_path: Option<PathBuf>,

    /// Largest input accepted by the file-based helpers, in bytes. Default: 10 MiB.
    pub max_input_bytes: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            ocr_api_key: None,
            vision_endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            ocr_timeout_secs: 90,
            ocr_language_hints: Vec::new(),
            pdfium_library_path: None,
            max_input_bytes: 10 * 1024 * 1024,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("ocr_api_key", &self.ocr_api_key.as_ref().map(|_| "<redacted>"))
            .field("vision_endpoint", &self.vision_endpoint)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("ocr_language_hints", &self.ocr_language_hints)
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("max_input_bytes", &self.max_input_bytes)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The credential, if one is configured and non-blank.
    pub fn ocr_credential(&self) -> Option<&str> {
        self.ocr_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }

    /// Whether image uploads will reach the OCR service.
    pub fn ocr_enabled(&self) -> bool {
        self.ocr_credential().is_some()
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn ocr_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.ocr_api_key = Some(key.into());
        self
    }

    /// Set or clear the credential from an optional value (e.g. an env lookup).
    pub fn maybe_ocr_api_key(mut self, key: Option<String>) -> Self {
        self.config.ocr_api_key = key;
        self
    }

    pub fn vision_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.vision_endpoint = url.into();
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn ocr_language_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.ocr_language_hints = hints.into_iter().map(Into::into).collect();
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(path.into());
        self
    }

    pub fn max_input_bytes(mut self, bytes: u64) -> Self {
        self.config.max_input_bytes = bytes;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Doc2MdError> {
        let c = &self.config;
        if !(c.vision_endpoint.starts_with("http://") || c.vision_endpoint.starts_with("https://"))
        {
            return Err(Doc2MdError::InvalidConfig(format!(
                "Vision endpoint must be an HTTP/HTTPS URL, got '{}'",
                c.vision_endpoint
            )));
        }
        if c.ocr_timeout_secs == 0 {
            return Err(Doc2MdError::InvalidConfig(
                "OCR timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_input_bytes == 0 {
            return Err(Doc2MdError::InvalidConfig(
                "Maximum input size must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.vision_endpoint, DEFAULT_VISION_ENDPOINT);
        assert_eq!(c.ocr_timeout_secs, 90);
        assert!(!c.ocr_enabled());
        assert!(c.ocr_language_hints.is_empty());
    }

    #[test]
    fn blank_key_counts_as_absent() {
        let c = ConversionConfig::builder().ocr_api_key("   ").build().unwrap();
        assert_eq!(c.ocr_credential(), None);
        assert!(!c.ocr_enabled());
    }

    #[test]
    fn debug_redacts_key() {
        let c = ConversionConfig::builder()
            .ocr_api_key("super-secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let err = ConversionConfig::builder()
            .vision_endpoint("ftp://vision")
            .build()
            .unwrap_err();
        assert!(matches!(err, Doc2MdError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(ConversionConfig::builder().ocr_timeout_secs(0).build().is_err());
    }

    #[test]
    fn language_hints_collected() {
        let c = ConversionConfig::builder()
            .ocr_language_hints(["pt", "en"])
            .build()
            .unwrap();
        assert_eq!(c.ocr_language_hints, vec!["pt".to_string(), "en".to_string()]);
    }
}
