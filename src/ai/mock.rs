use super::{GenerationService, TextChunkStream};
use crate::assembler::ContentPart;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted behaviour for [`MockGenerationClient::generate_stream`].
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Yields each entry in order; `None` is a chunk without text.
    Chunks(Vec<Option<String>>),
    /// Yields the chunks, then a transport error.
    FailMidStream { chunks: Vec<String>, error: String },
    /// Fails before producing anything.
    FailToStart(String),
}

#[derive(Clone)]
pub struct MockGenerationClient {
    responses: Arc<Mutex<Vec<Option<String>>>>,
    stream_script: Arc<Mutex<Option<StreamScript>>>,
    should_fail: Arc<Mutex<bool>>,
    requests: Arc<Mutex<Vec<Vec<ContentPart>>>>,
    chunks_pulled: Arc<AtomicUsize>,
    chunk_delay: Arc<Mutex<Option<Duration>>>,
}

impl MockGenerationClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            stream_script: Arc::new(Mutex::new(None)),
            should_fail: Arc::new(Mutex::new(false)),
            requests: Arc::new(Mutex::new(Vec::new())),
            chunks_pulled: Arc::new(AtomicUsize::new(0)),
            chunk_delay: Arc::new(Mutex::new(None)),
        }
    }

    /// Queues a blocking response; `None` simulates an answer without text.
    pub fn with_response(self, response: Option<String>) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    pub fn with_stream(self, script: StreamScript) -> Self {
        *self.stream_script.lock().unwrap() = Some(script);
        self
    }

    /// Waits `delay` before producing each stream chunk.
    pub fn with_chunk_delay(self, delay: Duration) -> Self {
        *self.chunk_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Content parts received by each call, oldest first.
    pub fn get_requests(&self) -> Vec<Vec<ContentPart>> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of chunks the consumer has pulled from mock streams.
    pub fn chunks_pulled(&self) -> usize {
        self.chunks_pulled.load(Ordering::SeqCst)
    }

    /// Concatenates every text part, the default answer when nothing is queued.
    fn echo(parts: &[ContentPart]) -> String {
        parts.iter().filter_map(ContentPart::as_text).collect()
    }
}

impl Default for MockGenerationClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerationService for MockGenerationClient {
    async fn generate(&self, parts: &[ContentPart]) -> Result<Option<String>> {
        let call_index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(parts.to_vec());
            requests.len() - 1
        };

        if *self.should_fail.lock().unwrap() {
            return Err(Error::AiProvider("Mock failure".to_string()));
        }

        let responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(Some(Self::echo(parts)))
        } else {
            Ok(responses[call_index % responses.len()].clone())
        }
    }

    async fn generate_stream(&self, parts: &[ContentPart]) -> Result<TextChunkStream> {
        self.requests.lock().unwrap().push(parts.to_vec());

        let script = self
            .stream_script
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| StreamScript::Chunks(vec![Some(Self::echo(parts))]));

        let items: Vec<Result<Option<String>>> = match script {
            StreamScript::FailToStart(error) => return Err(Error::AiProvider(error)),
            StreamScript::Chunks(chunks) => chunks.into_iter().map(Ok).collect(),
            StreamScript::FailMidStream { chunks, error } => chunks
                .into_iter()
                .map(|chunk| Ok(Some(chunk)))
                .chain(std::iter::once(Err(Error::AiProvider(error))))
                .collect(),
        };

        let pulled = self.chunks_pulled.clone();
        let delay = *self.chunk_delay.lock().unwrap();
        Ok(stream::iter(items)
            .then(move |item| async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .inspect(move |_| {
                pulled.fetch_add(1, Ordering::SeqCst);
            })
            .boxed())
    }
}
