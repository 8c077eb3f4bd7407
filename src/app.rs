//! Query orchestration: classify, search, decode, extract, assemble, generate.

use crate::ai::{GeminiGenerationClient, GenerationService};
use crate::assembler::{AssemblyInput, ContentAssembler, ContentPart};
use crate::attachment::decode_attachment;
use crate::generation::{FragmentStream, GenerationInvoker, GenerationOutcome};
use crate::intent;
use crate::models::{AttachmentPayload, Config, SearchProviderKind};
use crate::ocr::{extract_text, TesseractExtractor, TextExtractor};
use crate::search::{search_or_notice, DuckDuckGoSearch, GoogleSearch, SearchService};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// Runs one query through the pipeline. Holds only read-only capabilities,
/// so a single instance is shared by every request.
pub struct Pipeline {
    invoker: GenerationInvoker,
    search: Arc<dyn SearchService>,
    extractor: Option<Arc<dyn TextExtractor>>,
    assembler: ContentAssembler,
    search_max_results: usize,
}

/// Injectable service bundle used to construct [`Pipeline`] in tests/harnesses.
pub struct PipelineServices {
    pub generation: Arc<dyn GenerationService>,
    pub search: Arc<dyn SearchService>,
    pub extractor: Option<Arc<dyn TextExtractor>>,
    pub assembler: ContentAssembler,
    pub search_max_results: usize,
}

impl Pipeline {
    pub fn with_services(services: PipelineServices) -> Self {
        Self {
            invoker: GenerationInvoker::new(services.generation),
            search: services.search,
            extractor: services.extractor,
            assembler: services.assembler,
            search_max_results: services.search_max_results,
        }
    }

    /// Builds the production pipeline from configuration.
    pub fn from_config(config: &Config) -> Self {
        // Reuse one HTTP connection pool across backend clients.
        let http_client = reqwest::Client::new();

        let generation = GeminiGenerationClient::new_with_client(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            Duration::from_secs(config.generation_timeout_secs),
            http_client.clone(),
        );
        info!("Generation backend: Gemini (model: {})", generation.model());

        let search: Arc<dyn SearchService> = match config.search_provider {
            SearchProviderKind::DuckDuckGo => {
                info!("Search provider: DuckDuckGo");
                Arc::new(DuckDuckGoSearch::new_with_client(http_client))
            }
            SearchProviderKind::Google => {
                info!("Search provider: Google Programmable Search");
                Arc::new(GoogleSearch::new_with_client(
                    config.google_cse_api_key.clone(),
                    config.google_cse_id.clone(),
                    http_client,
                ))
            }
        };

        let extractor = if config.ocr_enabled {
            let located = TesseractExtractor::locate();
            if located.is_none() {
                tracing::warn!("OCR enabled but tesseract was not found on PATH; continuing without OCR");
            }
            located.map(|e| {
                Arc::new(e.with_max_chars(config.ocr_max_chars)) as Arc<dyn TextExtractor>
            })
        } else {
            info!("OCR disabled");
            None
        };

        Self::with_services(PipelineServices {
            generation: Arc::new(generation),
            search,
            extractor,
            assembler: ContentAssembler::new(config.ocr_max_chars),
            search_max_results: config.search_max_results,
        })
    }

    /// Gathers search results and attachment text, then assembles the
    /// ordered content sequence for the backend.
    pub async fn prepare(
        &self,
        query: &str,
        attachment: Option<&AttachmentPayload>,
    ) -> Vec<ContentPart> {
        let search = async {
            if intent::needs_search(query) {
                info!("Query needs search augmentation");
                Some(search_or_notice(self.search.as_ref(), query, self.search_max_results).await)
            } else {
                None
            }
        };

        let decode_and_extract = async {
            let decoded = attachment.and_then(decode_attachment);
            let extracted = match &decoded {
                Some(decoded) => extract_text(self.extractor.as_deref(), decoded).await,
                None => None,
            };
            (decoded, extracted)
        };

        let (search_results, (decoded, extracted)) = tokio::join!(search, decode_and_extract);

        let parts = self.assembler.assemble(AssemblyInput {
            query,
            attachment: decoded.as_ref(),
            extracted_text: extracted.as_deref(),
            search_results: search_results.as_deref(),
        });
        tracing::debug!("Assembled {} content part(s)", parts.len());
        parts
    }

    pub async fn answer_outcome(
        &self,
        query: &str,
        attachment: Option<&AttachmentPayload>,
    ) -> GenerationOutcome {
        let span = info_span!("query", request_id = %Uuid::new_v4(), streaming = false);
        async {
            info!("Processing query ({} chars)", query.chars().count());
            let parts = self.prepare(query, attachment).await;
            self.invoker.generate(&parts).await
        }
        .instrument(span)
        .await
    }

    /// Blocking answer. Empty output and failures come back as fallback text.
    pub async fn answer(&self, query: &str, attachment: Option<&AttachmentPayload>) -> String {
        self.answer_outcome(query, attachment).await.into_text()
    }

    /// Streaming answer. The returned stream yields at least one fragment.
    pub async fn answer_stream(
        &self,
        query: &str,
        attachment: Option<&AttachmentPayload>,
    ) -> FragmentStream {
        let span = info_span!("query", request_id = %Uuid::new_v4(), streaming = true);
        async {
            info!("Processing streaming query ({} chars)", query.chars().count());
            let parts = self.prepare(query, attachment).await;
            self.invoker.generate_stream(&parts).await
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::{Pipeline, PipelineServices};
    use crate::ai::{MockGenerationClient, StreamScript};
    use crate::assembler::{ContentAssembler, ContentPart};
    use crate::generation::{Fragment, GenerationOutcome, EMPTY_OUTPUT_FALLBACK};
    use crate::models::{AttachmentPayload, SearchResult};
    use crate::ocr::MockTextExtractor;
    use crate::prompts::{OCR_LABEL, SYSTEM_INSTRUCTIONS};
    use crate::search::{MockSearchClient, UNAVAILABLE_TITLE};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgo=";

    fn build_pipeline(
        generation: MockGenerationClient,
        search: MockSearchClient,
        extractor: Option<MockTextExtractor>,
    ) -> Pipeline {
        Pipeline::with_services(PipelineServices {
            generation: Arc::new(generation),
            search: Arc::new(search),
            extractor: extractor.map(|e| Arc::new(e) as Arc<dyn crate::ocr::TextExtractor>),
            assembler: ContentAssembler::default(),
            search_max_results: 3,
        })
    }

    fn png_attachment() -> AttachmentPayload {
        AttachmentPayload {
            data: PNG_DATA_URI.to_string(),
            mime: "image/png".to_string(),
        }
    }

    #[tokio::test]
    async fn test_echo_backend_returns_prefix_and_query() {
        let search = MockSearchClient::new();
        let pipeline = build_pipeline(MockGenerationClient::new(), search.clone(), None);

        let answer = pipeline.answer("hello there", None).await;

        assert_eq!(answer, format!("{}hello there", SYSTEM_INSTRUCTIONS));
        assert_eq!(search.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_search_query_includes_formatted_results() {
        let search = MockSearchClient::new()
            .with_results(vec![SearchResult::new("Q", "S", "http://x")]);
        let generation = MockGenerationClient::new();
        let pipeline = build_pipeline(generation.clone(), search.clone(), None);

        pipeline.answer("what is quantum computing", None).await;

        assert_eq!(search.get_queries(), vec!["what is quantum computing"]);
        let parts = &generation.get_requests()[0];
        let last = parts.last().and_then(ContentPart::as_text).unwrap();
        assert!(last.contains("- **Title**: Q"));
        assert!(last.contains("- **Snippet**: S"));
        assert!(last.contains("[http://x](http://x)"));
        assert!(last.contains("[source: url]"));
    }

    #[tokio::test]
    async fn test_search_failure_still_answers_with_notice() {
        let generation = MockGenerationClient::new();
        let pipeline = build_pipeline(
            generation.clone(),
            MockSearchClient::new().with_failure(true),
            None,
        );

        let outcome = pipeline.answer_outcome("latest news", None).await;

        assert!(outcome.is_success());
        let parts = &generation.get_requests()[0];
        assert!(parts
            .last()
            .and_then(ContentPart::as_text)
            .unwrap()
            .contains(UNAVAILABLE_TITLE));
    }

    #[tokio::test]
    async fn test_attachment_and_ocr_text_are_assembled_in_order() {
        let generation = MockGenerationClient::new();
        let ocr = MockTextExtractor::new().with_text("INVOICE 42".to_string());
        let pipeline = build_pipeline(generation.clone(), MockSearchClient::new(), Some(ocr.clone()));

        pipeline.answer("summarize this", Some(&png_attachment())).await;

        let parts = &generation.get_requests()[0];
        assert_eq!(parts.len(), 6);
        assert_eq!(
            parts[2],
            ContentPart::InlineBinary {
                media_type: "image/png".to_string(),
                bytes: vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
            }
        );
        assert_eq!(parts[3].as_text(), Some(OCR_LABEL));
        assert_eq!(parts[4].as_text(), Some("INVOICE 42"));
        assert_eq!(ocr.get_call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_attachment_is_dropped() {
        let generation = MockGenerationClient::new();
        let ocr = MockTextExtractor::new().with_text("never".to_string());
        let pipeline = build_pipeline(generation.clone(), MockSearchClient::new(), Some(ocr.clone()));

        let attachment = AttachmentPayload {
            data: "not a data uri".to_string(),
            mime: "image/png".to_string(),
        };
        pipeline.answer("hi", Some(&attachment)).await;

        let parts = &generation.get_requests()[0];
        assert_eq!(parts.len(), 2);
        assert!(parts
            .iter()
            .all(|p| !matches!(p, ContentPart::InlineBinary { .. })));
        assert_eq!(ocr.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_ocr_failure_is_silent() {
        let generation = MockGenerationClient::new();
        let pipeline = build_pipeline(
            generation.clone(),
            MockSearchClient::new(),
            Some(MockTextExtractor::new().with_failure(true)),
        );

        let outcome = pipeline.answer_outcome("hi", Some(&png_attachment())).await;

        assert!(outcome.is_success());
        assert_eq!(generation.get_requests()[0].len(), 3);
    }

    #[tokio::test]
    async fn test_generation_failure_becomes_error_text() {
        let pipeline = build_pipeline(
            MockGenerationClient::new().with_failure(true),
            MockSearchClient::new(),
            None,
        );

        let answer = pipeline.answer("hi", None).await;
        assert!(answer.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_empty_generation_becomes_fallback() {
        let pipeline = build_pipeline(
            MockGenerationClient::new().with_response(None),
            MockSearchClient::new(),
            None,
        );

        let outcome = pipeline.answer_outcome("hi", None).await;
        assert_eq!(outcome, GenerationOutcome::EmptyOutput);
        assert_eq!(outcome.into_text(), EMPTY_OUTPUT_FALLBACK);
    }

    #[tokio::test]
    async fn test_answer_stream_yields_backend_fragments() {
        let pipeline = build_pipeline(
            MockGenerationClient::new().with_stream(StreamScript::Chunks(vec![
                Some("Hel".to_string()),
                Some("lo".to_string()),
            ])),
            MockSearchClient::new(),
            None,
        );

        let fragments: Vec<Fragment> = pipeline.answer_stream("hi", None).await.collect().await;
        assert_eq!(
            fragments,
            vec![
                Fragment::Text("Hel".to_string()),
                Fragment::Text("lo".to_string())
            ]
        );
    }
}
