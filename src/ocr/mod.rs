//! Best-effort text extraction from attachments
//!
//! OCR is an optional capability. When no extractor is installed, or when
//! extraction fails, callers get `None` and the query continues without
//! extracted text.

pub mod mock;
pub mod tesseract;

pub use mock::MockTextExtractor;
pub use tesseract::TesseractExtractor;

use crate::attachment::DecodedAttachment;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extracts text from image or PDF bytes. `Ok(None)` means the media type
    /// is unsupported.
    async fn extract(&self, bytes: &[u8], media_type: &str) -> Result<Option<String>>;
}

/// Runs the extractor if one is installed, folding every failure and every
/// blank result into `None`.
pub async fn extract_text(
    extractor: Option<&dyn TextExtractor>,
    attachment: &DecodedAttachment,
) -> Option<String> {
    let extractor = extractor?;

    match extractor
        .extract(&attachment.bytes, &attachment.media_type)
        .await
    {
        Ok(Some(text)) if !text.trim().is_empty() => {
            tracing::info!(
                "Extracted {} characters from {} attachment",
                text.chars().count(),
                attachment.media_type
            );
            Some(text)
        }
        Ok(_) => {
            tracing::debug!("No text extracted from {} attachment", attachment.media_type);
            None
        }
        Err(e) => {
            tracing::warn!("Text extraction failed, continuing without it: {}", e);
            None
        }
    }
}

/// Cuts `text` to at most `max_chars` characters, on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_attachment() -> DecodedAttachment {
        DecodedAttachment {
            media_type: "image/png".to_string(),
            bytes: vec![0x89, 0x50, 0x4E, 0x47],
        }
    }

    #[test]
    fn test_truncate_shorter_text_is_unchanged() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_exact_bound() {
        let text = "x".repeat(9000);
        assert_eq!(truncate_chars(&text, 8000).chars().count(), 8000);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
    }

    #[tokio::test]
    async fn test_absent_extractor_yields_none() {
        assert!(extract_text(None, &png_attachment()).await.is_none());
    }

    #[tokio::test]
    async fn test_failure_yields_none() {
        let extractor = MockTextExtractor::new().with_failure(true);
        assert!(extract_text(Some(&extractor), &png_attachment())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_blank_text_yields_none() {
        let extractor = MockTextExtractor::new().with_text("  \n ".to_string());
        assert!(extract_text(Some(&extractor), &png_attachment())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_text_is_returned() {
        let extractor = MockTextExtractor::new().with_text("INVOICE 42".to_string());
        assert_eq!(
            extract_text(Some(&extractor), &png_attachment()).await,
            Some("INVOICE 42".to_string())
        );
    }
}
