//! Chat history collaborator
//!
//! The query pipeline never reads or writes history. The HTTP layer records
//! completed exchanges here when the caller identifies itself.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// One completed (query, response) exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub query: String,
    pub response: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn record(&self, user_id: &str, query: &str, response: &str) -> Result<()>;

    /// Entries for `user_id`, oldest first.
    async fn entries(&self, user_id: &str) -> Result<Vec<ChatEntry>>;
}

/// Process-local store keyed by opaque user id. Lost on restart.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    entries: Mutex<HashMap<String, Vec<ChatEntry>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn record(&self, user_id: &str, query: &str, response: &str) -> Result<()> {
        let entry = ChatEntry {
            query: query.to_string(),
            response: response.to_string(),
            timestamp: Utc::now(),
        };

        // Append under one lock so concurrent requests for a user never drop an entry
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| crate::Error::Generic("History store lock poisoned".to_string()))?;
        entries.entry(user_id.to_string()).or_default().push(entry);

        tracing::debug!("Recorded chat entry for user {}", user_id);
        Ok(())
    }

    async fn entries(&self, user_id: &str) -> Result<Vec<ChatEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| crate::Error::Generic("History store lock poisoned".to_string()))?;
        Ok(entries.get(user_id).cloned().unwrap_or_default())
    }
}
