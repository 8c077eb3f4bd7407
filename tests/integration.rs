use futures::StreamExt;
use my_ai_agent::{
    ai::{GeminiGenerationClient, MockGenerationClient, StreamScript},
    app::{Pipeline, PipelineServices},
    assembler::{ContentAssembler, ContentPart},
    generation::{Fragment, EMPTY_OUTPUT_FALLBACK},
    models::{AttachmentPayload, ChatRequest, SearchResult},
    ocr::{MockTextExtractor, TextExtractor},
    prompts::{OCR_LABEL, SYSTEM_INSTRUCTIONS},
    search::MockSearchClient,
    stream::{ChannelState, DeliveryChannel, MockSink, TERMINATOR},
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// "%PDF-1.4" followed by a newline
const PDF_DATA_URI: &str = "data:image/*;base64,JVBERi0xLjQK";

fn pipeline_with(
    generation: Arc<MockGenerationClient>,
    search: MockSearchClient,
    extractor: Option<MockTextExtractor>,
    ocr_max_chars: usize,
) -> Pipeline {
    Pipeline::with_services(PipelineServices {
        generation,
        search: Arc::new(search),
        extractor: extractor.map(|e| Arc::new(e) as Arc<dyn TextExtractor>),
        assembler: ContentAssembler::new(ocr_max_chars),
        search_max_results: 3,
    })
}

#[tokio::test]
async fn test_full_pipeline_with_search_attachment_and_ocr() {
    let generation = Arc::new(MockGenerationClient::new());
    let search = MockSearchClient::new().with_results(vec![
        SearchResult::new("Rust 1.90", "Released today", "https://blog.rust-lang.org"),
        SearchResult::new("Changelog", "Details", "https://github.com/rust-lang/rust"),
    ]);
    let ocr = MockTextExtractor::new().with_text("x".repeat(50));
    let pipeline = pipeline_with(generation.clone(), search.clone(), Some(ocr), 20);

    // Legacy image field with a PDF payload: the media type is sniffed
    let request: ChatRequest = serde_json::from_value(serde_json::json!({
        "prompt": "latest Rust release notes",
        "image": PDF_DATA_URI,
    }))
    .unwrap();
    let attachment = request.resolved_attachment();

    let answer = pipeline
        .answer(request.prompt_text().unwrap(), attachment.as_ref())
        .await;
    assert!(answer.starts_with(SYSTEM_INSTRUCTIONS));

    let parts = &generation.get_requests()[0];
    assert_eq!(parts.len(), 7);
    assert_eq!(parts[0].as_text(), Some(SYSTEM_INSTRUCTIONS));
    assert_eq!(parts[1].as_text(), Some("latest Rust release notes"));
    match &parts[2] {
        ContentPart::InlineBinary { media_type, bytes } => {
            assert_eq!(media_type, "application/pdf");
            assert!(bytes.starts_with(b"%PDF"));
        }
        other => panic!("expected inline binary, got {:?}", other),
    }
    assert_eq!(parts[3].as_text(), Some(OCR_LABEL));
    assert_eq!(parts[4].as_text().map(|t| t.chars().count()), Some(20));

    let search_part = parts[6].as_text().unwrap();
    let first = search_part.find("Rust 1.90").unwrap();
    let second = search_part.find("Changelog").unwrap();
    assert!(first < second);
    assert!(search_part.contains("[source: url]"));
    assert_eq!(search.get_call_count(), 1);
}

#[tokio::test]
async fn test_plain_query_skips_search_and_attachment_parts() {
    let generation = Arc::new(MockGenerationClient::new());
    let search = MockSearchClient::new();
    let pipeline = pipeline_with(generation.clone(), search.clone(), None, 8000);

    let bad_attachment = AttachmentPayload {
        data: "https://example.com/cat.png".to_string(),
        mime: "image/png".to_string(),
    };
    let answer = pipeline.answer("tell me a joke", Some(&bad_attachment)).await;

    assert_eq!(answer, format!("{}tell me a joke", SYSTEM_INSTRUCTIONS));
    assert_eq!(generation.get_requests()[0].len(), 2);
    assert_eq!(search.get_call_count(), 0);
}

#[tokio::test]
async fn test_empty_backend_answer_uses_fallback_text() {
    let generation = Arc::new(MockGenerationClient::new().with_response(None));
    let pipeline = pipeline_with(generation, MockSearchClient::new(), None, 8000);

    let answer = pipeline.answer("hi", None).await;
    assert_eq!(answer, EMPTY_OUTPUT_FALLBACK);
}

#[tokio::test]
async fn test_streamed_answer_reaches_client_with_terminator() {
    let generation = Arc::new(MockGenerationClient::new().with_stream(StreamScript::Chunks(
        vec![Some("Hel".to_string()), Some("lo".to_string())],
    )));
    let pipeline = pipeline_with(generation, MockSearchClient::new(), None, 8000);

    let sink = MockSink::new();
    let mut channel = DeliveryChannel::new(sink.clone());
    channel.begin_receiving();
    let state = channel.relay(pipeline.answer_stream("hi", None).await).await;

    assert_eq!(state, ChannelState::Terminated);
    assert_eq!(sink.sent(), vec!["Hel", "lo", TERMINATOR]);
}

#[tokio::test]
async fn test_stream_error_mid_way_closes_channel() {
    let generation = Arc::new(MockGenerationClient::new().with_stream(
        StreamScript::FailMidStream {
            chunks: vec!["Hel".to_string()],
            error: "backend reset".to_string(),
        },
    ));
    let pipeline = pipeline_with(generation, MockSearchClient::new(), None, 8000);

    let sink = MockSink::new();
    let mut channel = DeliveryChannel::new(sink.clone());
    let state = channel.relay(pipeline.answer_stream("hi", None).await).await;

    assert_eq!(state, ChannelState::Error);
    let sent = sink.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], "Hel");
    assert!(sent[1].starts_with("Error: "));
    assert!(!sent.iter().any(|s| s == TERMINATOR));
    assert!(sink.is_closed());
}

#[tokio::test]
async fn test_gemini_sse_stream_through_pipeline() {
    let server = MockServer::start().await;

    let body = [
        serde_json::json!({ "candidates": [{ "content": { "parts": [{ "text": "Qubits " }] } }] }),
        serde_json::json!({ "candidates": [{ "content": { "parts": [{ "text": "superpose." }] } }] }),
    ]
    .iter()
    .map(|event| format!("data: {}\n\n", event))
    .collect::<String>();

    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:streamGenerateContent"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gemini = GeminiGenerationClient::new(
        "test-key".to_string(),
        "gemini-2.5-flash".to_string(),
        Duration::from_secs(5),
    )
    .with_base_url(server.uri());

    let pipeline = Pipeline::with_services(PipelineServices {
        generation: Arc::new(gemini),
        search: Arc::new(MockSearchClient::new()),
        extractor: None,
        assembler: ContentAssembler::default(),
        search_max_results: 3,
    });

    let fragments: Vec<Fragment> = pipeline
        .answer_stream("explain qubits", None)
        .await
        .collect()
        .await;

    assert_eq!(
        fragments,
        vec![
            Fragment::Text("Qubits ".to_string()),
            Fragment::Text("superpose.".to_string())
        ]
    );
}

#[tokio::test]
async fn test_gemini_outage_streams_single_error_fragment() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let gemini = GeminiGenerationClient::new(
        "test-key".to_string(),
        "gemini-2.5-flash".to_string(),
        Duration::from_secs(5),
    )
    .with_base_url(server.uri());

    let pipeline = Pipeline::with_services(PipelineServices {
        generation: Arc::new(gemini),
        search: Arc::new(MockSearchClient::new()),
        extractor: None,
        assembler: ContentAssembler::default(),
        search_max_results: 3,
    });

    let sink = MockSink::new();
    let mut channel = DeliveryChannel::new(sink.clone());
    channel
        .relay(pipeline.answer_stream("hi", None).await)
        .await;

    let sent = sink.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].starts_with("Error: "));
    assert_eq!(sent[1], TERMINATOR);
}
