//! Data models and structures
//!
//! Defines the inbound request shapes, search results, and the process-wide
//! configuration loaded once at startup.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Media type used when a legacy `image` field carries no declared type.
pub const WILDCARD_IMAGE_MIME: &str = "image/*";

/// Attachment as it arrives on the wire: a data URI plus its declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentPayload {
    pub data: String,
    #[serde(default = "default_attachment_mime")]
    pub mime: String,
}

fn default_attachment_mime() -> String {
    WILDCARD_IMAGE_MIME.to_string()
}

/// Inbound query submission for both the HTTP and WebSocket surfaces.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    /// Older clients send `query` instead of `prompt`.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub attachment: Option<AttachmentPayload>,
    /// Legacy data-URI image field.
    #[serde(default)]
    pub image: Option<String>,
}

impl ChatRequest {
    /// Returns the trimmed-non-empty prompt, preferring `prompt` over `query`.
    pub fn prompt_text(&self) -> Option<&str> {
        [self.prompt.as_deref(), self.query.as_deref()]
            .into_iter()
            .flatten()
            .find(|p| !p.trim().is_empty())
    }

    /// Resolves the attachment, mapping the legacy `image` field when no
    /// explicit attachment was sent.
    pub fn resolved_attachment(&self) -> Option<AttachmentPayload> {
        match (&self.attachment, &self.image) {
            (Some(attachment), _) => Some(attachment.clone()),
            (None, Some(image)) => Some(AttachmentPayload {
                data: image.clone(),
                mime: WILDCARD_IMAGE_MIME.to_string(),
            }),
            (None, None) => None,
        }
    }
}

/// Body returned by every non-streaming endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// One ranked search hit. Rank is the position in the returned list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub source_url: String,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        snippet: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            source_url: source_url.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchProviderKind {
    DuckDuckGo,
    Google,
}

impl FromStr for SearchProviderKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "duckduckgo" | "ddg" => Ok(Self::DuckDuckGo),
            "google" | "google_cse" | "cse" => Ok(Self::Google),
            other => Err(crate::Error::Config(format!(
                "Unknown SEARCH_PROVIDER '{}'. Expected 'duckduckgo' or 'google'",
                other
            ))),
        }
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub generation_timeout_secs: u64,
    pub search_provider: SearchProviderKind,
    pub google_cse_api_key: Option<String>,
    pub google_cse_id: Option<String>,
    pub search_max_results: usize,
    pub ocr_enabled: bool,
    pub ocr_max_chars: usize,
    pub cors_origins: Vec<String>,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. `from_env` delegates here
    /// so tests never have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            gemini_api_key: non_empty("GEMINI_API_KEY")
                .ok_or_else(|| crate::Error::Config("GEMINI_API_KEY not set".to_string()))?,
            gemini_model: non_empty("GEMINI_MODEL")
                .unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            generation_timeout_secs: parse_or(
                "GENERATION_TIMEOUT_SECS",
                non_empty("GENERATION_TIMEOUT_SECS"),
                60,
            )?,
            search_provider: non_empty("SEARCH_PROVIDER")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(SearchProviderKind::DuckDuckGo),
            google_cse_api_key: non_empty("GOOGLE_CSE_API_KEY"),
            google_cse_id: non_empty("GOOGLE_CSE_ID"),
            search_max_results: parse_or("SEARCH_MAX_RESULTS", non_empty("SEARCH_MAX_RESULTS"), 3)?,
            ocr_enabled: parse_or("OCR_ENABLED", non_empty("OCR_ENABLED"), true)?,
            ocr_max_chars: match parse_or("OCR_MAX_CHARS", non_empty("OCR_MAX_CHARS"), 8000)? {
                0 => {
                    return Err(crate::Error::Config(
                        "OCR_MAX_CHARS must be greater than zero".to_string(),
                    ))
                }
                bound => bound,
            },
            cors_origins: non_empty("CORS_ORIGINS")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            host: non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", non_empty("PORT"), 8000)?,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> crate::Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| crate::Error::Config(format!("Invalid value for {}: '{}'", key, raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_lookup(lookup_from(&[("GEMINI_API_KEY", "key")])).unwrap();

        assert_eq!(config.gemini_model, "gemini-2.5-flash");
        assert_eq!(config.search_provider, SearchProviderKind::DuckDuckGo);
        assert_eq!(config.search_max_results, 3);
        assert_eq!(config.ocr_max_chars, 8000);
        assert!(config.ocr_enabled);
        assert_eq!(config.cors_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.port, 8000);
        assert!(config.google_cse_api_key.is_none());
    }

    #[test]
    fn test_config_rejects_zero_ocr_bound() {
        let err = Config::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "key"),
            ("OCR_MAX_CHARS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, crate::Error::Config(msg) if msg.contains("OCR_MAX_CHARS")));
    }

    #[test]
    fn test_config_requires_gemini_key() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_config_rejects_invalid_number() {
        let err = Config::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "key"),
            ("OCR_MAX_CHARS", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("OCR_MAX_CHARS"));
    }

    #[test]
    fn test_config_google_provider_and_origins() {
        let config = Config::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "key"),
            ("SEARCH_PROVIDER", "Google"),
            ("GOOGLE_CSE_API_KEY", "cse-key"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
        ]))
        .unwrap();

        assert_eq!(config.search_provider, SearchProviderKind::Google);
        assert_eq!(config.google_cse_api_key.as_deref(), Some("cse-key"));
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_unknown_search_provider_is_config_error() {
        let err = "bing".parse::<SearchProviderKind>().unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_legacy_image_field_maps_to_wildcard_attachment() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"prompt": "describe", "image": "data:image/png;base64,AAAA"}"#,
        )
        .unwrap();

        let attachment = request.resolved_attachment().unwrap();
        assert_eq!(attachment.data, "data:image/png;base64,AAAA");
        assert_eq!(attachment.mime, WILDCARD_IMAGE_MIME);
    }

    #[test]
    fn test_explicit_attachment_wins_over_image() {
        let request: ChatRequest = serde_json::from_str(
            r#"{
                "prompt": "describe",
                "attachment": {"data": "data:application/pdf;base64,AAAA", "mime": "application/pdf"},
                "image": "data:image/png;base64,BBBB"
            }"#,
        )
        .unwrap();

        assert_eq!(request.resolved_attachment().unwrap().mime, "application/pdf");
    }

    #[test]
    fn test_prompt_text_falls_back_to_query_and_skips_blank() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"prompt": "   ", "query": "hello"}"#).unwrap();
        assert_eq!(request.prompt_text(), Some("hello"));

        let empty: ChatRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.prompt_text(), None);
    }
}
