use super::client::GeminiHttpClient;
use super::types::{Content, GenerateContentRequest, GenerateContentResponse, InlineData, Part};
use crate::ai::{GenerationService, TextChunkStream};
use crate::assembler::ContentPart;
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use futures::stream::{self, BoxStream, StreamExt};
use std::time::Duration;

pub struct GeminiGenerationClient {
    http: GeminiHttpClient,
}

impl GeminiGenerationClient {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Self {
        Self::new_with_client(api_key, model, timeout, reqwest::Client::new())
    }

    pub fn new_with_client(
        api_key: String,
        model: String,
        timeout: Duration,
        client: reqwest::Client,
    ) -> Self {
        Self {
            http: GeminiHttpClient::new_with_client(api_key, model, timeout, client),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    pub fn model(&self) -> &str {
        self.http.model()
    }

    fn build_request(parts: &[ContentPart]) -> GenerateContentRequest {
        let parts = parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => Part::Text { text: text.clone() },
                ContentPart::InlineBinary { media_type, bytes } => Part::InlineData {
                    inline_data: InlineData {
                        mime_type: media_type.clone(),
                        data: base64::engine::general_purpose::STANDARD.encode(bytes),
                    },
                },
            })
            .collect();

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
        }
    }
}

#[async_trait]
impl GenerationService for GeminiGenerationClient {
    async fn generate(&self, parts: &[ContentPart]) -> Result<Option<String>> {
        tracing::debug!(
            "Sending {} content part(s) to Gemini ({})",
            parts.len(),
            self.model()
        );

        let request = Self::build_request(parts);
        let response: GenerateContentResponse = self.http.generate_content(&request).await?;

        if response.text().is_none() {
            tracing::warn!(
                "Gemini returned no text (finish reason: {:?})",
                response.finish_reason()
            );
        }

        Ok(response.text())
    }

    async fn generate_stream(&self, parts: &[ContentPart]) -> Result<TextChunkStream> {
        tracing::debug!(
            "Streaming {} content part(s) from Gemini ({})",
            parts.len(),
            self.model()
        );

        let request = Self::build_request(parts);
        let response = self.http.stream_generate_content(&request).await?;

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed();

        Ok(sse_text_chunks(bytes))
    }
}

struct SseState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    finished: bool,
}

/// Turns a raw SSE body into one item per `data:` event.
///
/// The stream is lazy: the body is only read when the consumer asks for the
/// next chunk, and dropping the stream drops the underlying connection.
fn sse_text_chunks(
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
) -> TextChunkStream {
    let state = SseState {
        bytes,
        buffer: Vec::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            // Split on raw bytes so multi-byte characters may straddle chunks
            if let Some(line_end) = state.buffer.iter().position(|&b| b == b'\n') {
                let line = String::from_utf8_lossy(&state.buffer[..line_end])
                    .trim_end_matches('\r')
                    .to_string();
                state.buffer.drain(..=line_end);

                if let Some(item) = parse_event_line(&line) {
                    return Some((item, state));
                }
                continue;
            }

            if state.finished {
                // Flush a trailing event that arrived without a newline
                let rest = std::mem::take(&mut state.buffer);
                let rest = String::from_utf8_lossy(&rest).into_owned();
                return parse_event_line(rest.trim_end()).map(|item| (item, state));
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    state.finished = true;
                    state.buffer.clear();
                    return Some((
                        Err(Error::AiProvider(format!("Gemini stream interrupted: {}", e))),
                        state,
                    ));
                }
                None => state.finished = true,
            }
        }
    })
    .boxed()
}

fn parse_event_line(line: &str) -> Option<Result<Option<String>>> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }

    let event = match serde_json::from_str::<GenerateContentResponse>(data) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!("Failed to parse Gemini stream event: {}\nData: {}", e, data);
            return Some(Err(Error::AiProvider(format!(
                "Failed to parse Gemini stream event: {}",
                e
            ))));
        }
    };

    if let Some(api_error) = event.error {
        tracing::error!(
            "Gemini stream aborted (code {:?}, status {:?}): {}",
            api_error.code,
            api_error.status,
            api_error.message
        );
        return Some(Err(Error::AiProvider(format!(
            "Gemini stream aborted: {}",
            api_error.message
        ))));
    }

    Some(Ok(event.text()))
}
