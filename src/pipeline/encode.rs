//! Image encoding: raw upload bytes → base64 payload for the OCR request body.
//!
//! The document-text-detection API takes the image inline as standard
//! (padded, non-URL-safe) base64 in `image.content`; it sniffs the format
//! itself, so no re-encoding or media type is needed.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Encode image bytes as the base64 string expected by the OCR request.
pub fn encode_image(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image {} bytes → {} bytes base64", bytes.len(), b64.len());
    b64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_padding() {
        assert_eq!(encode_image(b"foo"), "Zm9v");
        assert_eq!(encode_image(b"fo"), "Zm8=");
    }

    #[test]
    fn empty_input() {
        assert_eq!(encode_image(&[]), "");
    }
}
