//! OCR: send an image to the document-text-detection API and normalise the result.
//!
//! This is the only stage with network I/O. A missing credential (no request
//! is sent) and an empty annotation each yield a fixed heading; real text is
//! normalised with its line breaks kept. A non-2xx answer is different:
//! quota and credential problems must reach the caller, so it becomes
//! [`Doc2MdError::UpstreamOcr`] carrying the status and body.
//!
//! ## Transport seam
//!
//! [`VisionTransport`] only moves a request and returns status + body; all
//! interpretation lives in [`extract_ocr`]. Tests swap in a canned transport
//! without touching HTTP, and the production [`ReqwestTransport`] builds its
//! client once on first use.

use crate::error::Doc2MdError;
use crate::pipeline::normalize::{normalize_with, LineBreaks};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Markdown returned when no credential is configured.
pub const OCR_DISABLED_MESSAGE: &str =
    "# OCR não habilitado. Defina GOOGLE_VISION_API_KEY na Vercel.";

/// Markdown returned when the API found no text in the image.
pub const OCR_NO_TEXT_MESSAGE: &str = "# OCR não retornou texto";

const DOCUMENT_TEXT_DETECTION: &str = "DOCUMENT_TEXT_DETECTION";

// ── Request body ─────────────────────────────────────────────────────────────

/// Body of an `images:annotate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotateRequest {
    pub requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotateImageRequest {
    pub image: ImageContent,
    pub features: Vec<Feature>,
    #[serde(rename = "imageContext", skip_serializing_if = "Option::is_none")]
    pub image_context: Option<ImageContext>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageContent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageContext {
    #[serde(rename = "languageHints")]
    pub language_hints: Vec<String>,
}

impl AnnotateRequest {
    /// A single document-text-detection request for one base64 image.
    pub fn document_text(image_base64: &str, language_hints: &[String]) -> Self {
        let image_context = (!language_hints.is_empty()).then(|| ImageContext {
            language_hints: language_hints.to_vec(),
        });
        Self {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: image_base64.to_string(),
                },
                features: vec![Feature {
                    kind: DOCUMENT_TEXT_DETECTION.to_string(),
                }],
                image_context,
            }],
        }
    }
}

// ── Transport ────────────────────────────────────────────────────────────────

/// Raw HTTP answer from the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Moves one annotate request to the API and hands back status and body.
///
/// Implementations return `Err` only when no HTTP response was obtained.
#[async_trait]
pub trait VisionTransport: Send + Sync {
    async fn annotate(
        &self,
        api_key: &str,
        request: &AnnotateRequest,
    ) -> Result<TransportResponse, Doc2MdError>;
}

/// Production transport: HTTPS via reqwest, API key as the `key` query parameter.
#[derive(Debug)]
pub struct ReqwestTransport {
    endpoint: String,
    timeout: Duration,
    client: OnceLock<reqwest::Client>,
}

impl ReqwestTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            client: OnceLock::new(),
        }
    }

    /// The shared client, built on first use.
    fn client(&self) -> Result<&reqwest::Client, Doc2MdError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Doc2MdError::OcrTransport {
                detail: format!("Failed to build HTTP client: {e}"),
            })?;
        // A concurrent first call may have won the race; either client is fine.
        Ok(self.client.get_or_init(|| client))
    }
}

#[async_trait]
impl VisionTransport for ReqwestTransport {
    async fn annotate(
        &self,
        api_key: &str,
        request: &AnnotateRequest,
    ) -> Result<TransportResponse, Doc2MdError> {
        let response = self
            .client()?
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;
        debug!("Vision API answered {} ({} bytes)", status, body.len());

        Ok(TransportResponse { status, body })
    }
}

impl ReqwestTransport {
    fn map_send_error(&self, e: reqwest::Error) -> Doc2MdError {
        if e.is_timeout() {
            Doc2MdError::OcrTimeout {
                secs: self.timeout.as_secs(),
            }
        } else {
            // Drop the URL: it carries the API key in its query string.
            Doc2MdError::OcrTransport {
                detail: e.without_url().to_string(),
            }
        }
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

/// Recognise text in a base64 image and return it as Markdown.
///
/// `credential` is the API key; None or blank disables OCR without any
/// network call.
pub async fn extract_ocr(
    image_base64: &str,
    credential: Option<&str>,
    transport: &dyn VisionTransport,
    language_hints: &[String],
) -> Result<String, Doc2MdError> {
    let Some(api_key) = credential.filter(|k| !k.trim().is_empty()) else {
        warn!("OCR requested but {} is not configured", crate::config::OCR_API_KEY_VAR);
        return Ok(OCR_DISABLED_MESSAGE.to_string());
    };

    let request = AnnotateRequest::document_text(image_base64, language_hints);
    let response = transport.annotate(api_key, &request).await?;

    if !response.is_success() {
        warn!("Vision API rejected the request with status {}", response.status);
        return Err(Doc2MdError::UpstreamOcr {
            status: response.status,
            body: response.body,
        });
    }

    let text = annotation_text(&response.body)?;
    if text.trim().is_empty() {
        info!("Vision API returned no text");
        return Ok(OCR_NO_TEXT_MESSAGE.to_string());
    }

    let markdown = normalize_with(&text, LineBreaks::Preserve);
    debug!("OCR produced {} chars", markdown.len());
    Ok(markdown)
}

/// Pull `responses[0].fullTextAnnotation.text` out of a success body.
///
/// Any missing or null level means "no text". A per-image `error` object is
/// reported as [`Doc2MdError::OcrRejected`].
fn annotation_text(body: &str) -> Result<String, Doc2MdError> {
    if body.trim().is_empty() {
        return Ok(String::new());
    }
    let value: Value = serde_json::from_str(body).map_err(|e| Doc2MdError::OcrResponseMalformed {
        detail: e.to_string(),
    })?;

    if let Some(error) = value.pointer("/responses/0/error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(Doc2MdError::OcrRejected { message });
    }

    Ok(value
        .pointer("/responses/0/fullTextAnnotation/text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Canned transport that records what it was asked.
    struct CannedTransport {
        response: TransportResponse,
        calls: AtomicUsize,
        last_key: Mutex<Option<String>>,
    }

    impl CannedTransport {
        fn new(status: u16, body: &str) -> Self {
            Self {
                response: TransportResponse {
                    status,
                    body: body.to_string(),
                },
                calls: AtomicUsize::new(0),
                last_key: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl VisionTransport for CannedTransport {
        async fn annotate(
            &self,
            api_key: &str,
            _request: &AnnotateRequest,
        ) -> Result<TransportResponse, Doc2MdError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_key.lock().unwrap() = Some(api_key.to_string());
            Ok(self.response.clone())
        }
    }

    #[test]
    fn client_is_built_once_per_transport() {
        let transport = ReqwestTransport::new(
            crate::config::DEFAULT_VISION_ENDPOINT,
            Duration::from_secs(5),
        );
        let first = transport.client().unwrap() as *const reqwest::Client;
        let second = transport.client().unwrap() as *const reqwest::Client;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_credential_disables_ocr_without_network() {
        let transport = CannedTransport::new(200, "{}");
        for credential in [None, Some(""), Some("  ")] {
            let md = extract_ocr("Zm9v", credential, &transport, &[]).await.unwrap();
            assert_eq!(md, "# OCR não habilitado. Defina GOOGLE_VISION_API_KEY na Vercel.");
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn already_normalised_text_passes_through() {
        let body = r#"{"responses":[{"fullTextAnnotation":{"text":"Linha 1\nLinha 2\n\nLinha 3"}}]}"#;
        let transport = CannedTransport::new(200, body);
        let md = extract_ocr("Zm9v", Some("test-key"), &transport, &[]).await.unwrap();
        assert_eq!(md, "Linha 1\nLinha 2\n\nLinha 3");
        assert_eq!(transport.last_key.lock().unwrap().as_deref(), Some("test-key"));
    }

    #[tokio::test]
    async fn text_is_trimmed_and_paragraphs_tidied() {
        let body = r#"{"responses":[{"fullTextAnnotation":{"text":"\r\nTotal: 10\r\n\r\n\r\nObrigado\n"}}]}"#;
        let transport = CannedTransport::new(200, body);
        let md = extract_ocr("Zm9v", Some("k"), &transport, &[]).await.unwrap();
        assert_eq!(md, "Total: 10\n\nObrigado");
    }

    #[tokio::test]
    async fn non_success_status_propagates() {
        let transport = CannedTransport::new(403, "forbidden");
        let err = extract_ocr("Zm9v", Some("test-key"), &transport, &[])
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("403"), "got: {msg}");
        assert!(msg.contains("forbidden"), "got: {msg}");
        assert!(matches!(err, Doc2MdError::UpstreamOcr { status: 403, .. }));
    }

    #[tokio::test]
    async fn missing_levels_mean_no_text() {
        let bodies = [
            "",
            "{}",
            r#"{"responses":[]}"#,
            r#"{"responses":null}"#,
            r#"{"responses":[{}]}"#,
            r#"{"responses":[{"fullTextAnnotation":null}]}"#,
            r#"{"responses":[{"fullTextAnnotation":{}}]}"#,
            r#"{"responses":[{"fullTextAnnotation":{"text":"   "}}]}"#,
        ];
        for body in bodies {
            let transport = CannedTransport::new(200, body);
            let md = extract_ocr("Zm9v", Some("k"), &transport, &[]).await.unwrap();
            assert_eq!(md, OCR_NO_TEXT_MESSAGE, "body: {body:?}");
        }
    }

    #[tokio::test]
    async fn per_image_error_is_rejected() {
        let body = r#"{"responses":[{"error":{"code":3,"message":"Bad image data."}}]}"#;
        let transport = CannedTransport::new(200, body);
        let err = extract_ocr("Zm9v", Some("k"), &transport, &[]).await.unwrap_err();
        assert!(err.to_string().contains("Bad image data."));
    }

    #[tokio::test]
    async fn garbage_body_is_malformed() {
        let transport = CannedTransport::new(200, "<html>oops</html>");
        let err = extract_ocr("Zm9v", Some("k"), &transport, &[]).await.unwrap_err();
        assert!(matches!(err, Doc2MdError::OcrResponseMalformed { .. }));
    }

    #[test]
    fn request_shape_without_hints() {
        let req = AnnotateRequest::document_text("Zm9v", &[]);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "requests": [{
                    "image": { "content": "Zm9v" },
                    "features": [{ "type": "DOCUMENT_TEXT_DETECTION" }]
                }]
            })
        );
    }

    #[test]
    fn request_shape_with_hints() {
        let req = AnnotateRequest::document_text("Zm9v", &["pt".to_string(), "en".to_string()]);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json["requests"][0]["imageContext"]["languageHints"],
            serde_json::json!(["pt", "en"])
        );
    }
}
