use super::FragmentSink;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Records everything sent; optionally starts failing after `n` sends to
/// simulate a client that disconnected.
#[derive(Clone, Default)]
pub struct MockSink {
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<bool>>,
    fail_after: Option<usize>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_after(mut self, sends: usize) -> Self {
        self.fail_after = Some(sends);
        self
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl FragmentSink for MockSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        let mut sent = self.sent.lock().unwrap();
        if *self.closed.lock().unwrap() || self.fail_after.is_some_and(|n| sent.len() >= n) {
            return Err(Error::Connection("Mock sink disconnected".to_string()));
        }
        sent.push(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}
