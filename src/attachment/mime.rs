pub const PDF_MIME: &str = "application/pdf";

/// Sniffs the media type from leading magic bytes.
pub fn detect_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [0x25, 0x50, 0x44, 0x46, 0x2D, ..] => Some(PDF_MIME),
        _ => None,
    }
}

/// Picks the media type to forward for an attachment.
///
/// A concrete declared type is trusted as-is. Wildcards (`image/*`) and empty
/// declarations are resolved by sniffing, falling back to `image/png`.
pub fn resolve_media_type(declared: &str, bytes: &[u8]) -> String {
    let declared = declared.trim();
    if !declared.is_empty() && !declared.ends_with("/*") {
        return declared.to_ascii_lowercase();
    }

    match detect_mime(bytes) {
        Some(mime) => mime.to_string(),
        None => {
            tracing::warn!(
                "Unrecognized attachment format (first 4 bytes: {:02X?}), falling back to image/png",
                &bytes[..bytes.len().min(4)]
            );
            "image/png".to_string()
        }
    }
}

pub fn is_image(media_type: &str) -> bool {
    media_type.starts_with("image/")
}

pub fn is_pdf(media_type: &str) -> bool {
    media_type == PDF_MIME
}
