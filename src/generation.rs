//! Generation invocation with outcome normalization
//!
//! Wraps a [`GenerationService`] so callers never see a raw backend error:
//! blocking calls resolve to a [`GenerationOutcome`] that always renders as
//! readable text, and streaming calls always yield at least one fragment.

use crate::ai::GenerationService;
use crate::assembler::ContentPart;
use crate::Error;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;

pub const EMPTY_OUTPUT_FALLBACK: &str = "Sorry, I couldn't generate a response. Please try again.";
/// Substituted for a streamed chunk that carried no text.
pub const EMPTY_FRAGMENT_FALLBACK: &str = "[No content in this chunk]";

/// Result of a blocking generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Success(String),
    EmptyOutput,
    Failure(String),
}

impl GenerationOutcome {
    /// Renders the outcome as user-facing text.
    pub fn into_text(self) -> String {
        match self {
            Self::Success(text) => text,
            Self::EmptyOutput => EMPTY_OUTPUT_FALLBACK.to_string(),
            Self::Failure(reason) => format!("Error: {}", reason),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// One unit produced by a streaming generation.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    /// The backend failed after streaming had started. Always the last item.
    Failed(String),
}

pub type FragmentStream = BoxStream<'static, Fragment>;

const STREAM_INTERRUPTED: &str = "the generation stream was interrupted";

/// Short reason shown to the client. The full error only goes to the log.
fn client_reason(error: &Error) -> &'static str {
    match error {
        Error::Http(e) if e.is_timeout() => "the generation service timed out",
        Error::Http(_) => "could not reach the generation service",
        _ => "the generation service is unavailable",
    }
}

#[derive(Clone)]
pub struct GenerationInvoker {
    backend: Arc<dyn GenerationService>,
}

impl GenerationInvoker {
    pub fn new(backend: Arc<dyn GenerationService>) -> Self {
        Self { backend }
    }

    pub async fn generate(&self, parts: &[ContentPart]) -> GenerationOutcome {
        match self.backend.generate(parts).await {
            Ok(Some(text)) if !text.trim().is_empty() => GenerationOutcome::Success(text),
            Ok(_) => {
                tracing::warn!("Generation returned no text");
                GenerationOutcome::EmptyOutput
            }
            Err(e) => {
                tracing::error!("Generation failed: {}", e);
                GenerationOutcome::Failure(client_reason(&e).to_string())
            }
        }
    }

    /// Opens a fragment stream.
    ///
    /// A failure to start yields a single error text fragment. Chunks without
    /// text become [`EMPTY_FRAGMENT_FALLBACK`]. A mid-stream failure yields
    /// [`Fragment::Failed`] and ends the stream.
    pub async fn generate_stream(&self, parts: &[ContentPart]) -> FragmentStream {
        let chunks = match self.backend.generate_stream(parts).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::error!("Streaming generation failed to start: {}", e);
                let text = format!("Error: {}", client_reason(&e));
                return stream::once(async move { Fragment::Text(text) }).boxed();
            }
        };

        chunks
            .scan(false, |failed, chunk| {
                if *failed {
                    return futures::future::ready(None);
                }
                let fragment = match chunk {
                    Ok(Some(text)) if !text.is_empty() => Fragment::Text(text),
                    Ok(_) => {
                        tracing::debug!("Substituting fallback for empty stream chunk");
                        Fragment::Text(EMPTY_FRAGMENT_FALLBACK.to_string())
                    }
                    Err(e) => {
                        tracing::error!("Streaming generation interrupted: {}", e);
                        *failed = true;
                        Fragment::Failed(STREAM_INTERRUPTED.to_string())
                    }
                };
                futures::future::ready(Some(fragment))
            })
            .boxed()
    }
}
