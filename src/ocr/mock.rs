use super::TextExtractor;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockTextExtractor {
    text: Arc<Mutex<Option<String>>>,
    should_fail: Arc<Mutex<bool>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockTextExtractor {
    pub fn new() -> Self {
        Self {
            text: Arc::new(Mutex::new(None)),
            should_fail: Arc::new(Mutex::new(false)),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_text(self, text: String) -> Self {
        *self.text.lock().unwrap() = Some(text);
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

impl Default for MockTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for MockTextExtractor {
    async fn extract(&self, _bytes: &[u8], _media_type: &str) -> Result<Option<String>> {
        *self.call_count.lock().unwrap() += 1;

        if *self.should_fail.lock().unwrap() {
            return Err(Error::Ocr("Mock failure".to_string()));
        }

        Ok(self.text.lock().unwrap().clone())
    }
}
