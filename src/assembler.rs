//! Multimodal prompt assembly
//!
//! Builds the ordered content sequence sent to the generation backend. The
//! order is fixed: system instructions, user query, attachment bytes, OCR
//! text, search results. Sections whose input is missing are left out
//! entirely rather than replaced with placeholders.

use crate::attachment::DecodedAttachment;
use crate::models::SearchResult;
use crate::ocr::truncate_chars;
use crate::prompts;
use crate::search::format_results;

pub const DEFAULT_OCR_MAX_CHARS: usize = 8000;

/// One unit of multimodal input for the generation backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    InlineBinary { media_type: String, bytes: Vec<u8> },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::InlineBinary { .. } => None,
        }
    }
}

/// Everything gathered for one request before assembly.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssemblyInput<'a> {
    pub query: &'a str,
    pub attachment: Option<&'a DecodedAttachment>,
    pub extracted_text: Option<&'a str>,
    /// `Some` when search augmentation was requested, even if it found nothing.
    pub search_results: Option<&'a [SearchResult]>,
}

#[derive(Debug, Clone)]
pub struct ContentAssembler {
    ocr_max_chars: usize,
}

impl ContentAssembler {
    pub fn new(ocr_max_chars: usize) -> Self {
        Self { ocr_max_chars }
    }

    pub fn assemble(&self, input: AssemblyInput<'_>) -> Vec<ContentPart> {
        let mut parts = vec![
            ContentPart::text(prompts::SYSTEM_INSTRUCTIONS),
            ContentPart::text(input.query),
        ];

        if let Some(attachment) = input.attachment {
            parts.push(ContentPart::InlineBinary {
                media_type: attachment.media_type.clone(),
                bytes: attachment.bytes.clone(),
            });
        }

        let extracted = input
            .extracted_text
            .map(|text| truncate_chars(text, self.ocr_max_chars))
            .filter(|text| !text.trim().is_empty());
        if let Some(text) = extracted {
            parts.push(ContentPart::text(prompts::OCR_LABEL));
            parts.push(ContentPart::Text(text));
            parts.push(ContentPart::text(prompts::OCR_INSTRUCTION));
        }

        if let Some(results) = input.search_results {
            parts.push(ContentPart::text(prompts::render(
                prompts::SEARCH_CONTEXT,
                &[("results", format_results(results).as_str())],
            )));
        }

        parts
    }
}

impl Default for ContentAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_OCR_MAX_CHARS)
    }
}
