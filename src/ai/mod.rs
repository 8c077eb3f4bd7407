//! Generation backend integration
//!
//! The backend is an opaque capability: it takes an ordered list of content
//! parts and returns text, either all at once or as a lazy stream of chunks.
//! Outcome normalization lives in [`crate::generation`].

pub mod gemini;
pub mod mock;

pub use gemini::GeminiGenerationClient;
pub use mock::{MockGenerationClient, StreamScript};

use crate::assembler::ContentPart;
use crate::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazy stream of backend chunks. `Ok(None)` is a chunk that carried no text.
pub type TextChunkStream = BoxStream<'static, Result<Option<String>>>;

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Returns `Ok(None)` when the backend answered without any text.
    async fn generate(&self, parts: &[ContentPart]) -> Result<Option<String>>;

    /// Opens a streaming generation. Errors here mean nothing was produced.
    async fn generate_stream(&self, parts: &[ContentPart]) -> Result<TextChunkStream>;
}
