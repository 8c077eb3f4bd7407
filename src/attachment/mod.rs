//! Attachment decoding
//!
//! Turns an inbound data-URI attachment into raw bytes plus a concrete media
//! type. Anything that does not decode is dropped: a bad attachment never
//! fails the request, the query simply proceeds without it.

pub mod mime;

use crate::models::AttachmentPayload;
use base64::Engine as _;

/// Attachment bytes ready to be forwarded or OCR'ed.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAttachment {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

/// Decodes a `data:<mediaType>;base64,<payload>` string.
///
/// Returns `None` for anything that is not a base64 data URI or whose payload
/// is malformed or empty.
pub fn decode_data_uri(encoded: &str) -> Option<DecodedAttachment> {
    let rest = encoded.trim().strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let media_header = header.strip_suffix(";base64")?;
    // Parameters such as `;charset=utf-8` may sit between type and encoding
    let media_type = media_header
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = match base64::engine::general_purpose::STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Dropping attachment with malformed base64 payload: {}", e);
            return None;
        }
    };

    if bytes.is_empty() {
        tracing::warn!("Dropping attachment with empty payload");
        return None;
    }

    Some(DecodedAttachment { media_type, bytes })
}

/// Decodes an inbound attachment, resolving wildcard media types.
///
/// The data URI's own type wins unless it is a wildcard or missing, in which
/// case the declared `mime` is used and finally the bytes are sniffed.
pub fn decode_attachment(payload: &AttachmentPayload) -> Option<DecodedAttachment> {
    let Some(decoded) = decode_data_uri(&payload.data) else {
        tracing::warn!(
            "Attachment is not a base64 data URI (declared {}), continuing without it",
            payload.mime
        );
        return None;
    };

    let declared = if decoded.media_type.is_empty() || decoded.media_type.ends_with("/*") {
        payload.mime.as_str()
    } else {
        decoded.media_type.as_str()
    };
    let media_type = mime::resolve_media_type(declared, &decoded.bytes);

    tracing::debug!(
        "Decoded attachment: {} ({} bytes)",
        media_type,
        decoded.bytes.len()
    );

    Some(DecodedAttachment {
        media_type,
        bytes: decoded.bytes,
    })
}
