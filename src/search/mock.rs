use super::SearchService;
use crate::models::SearchResult;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockSearchClient {
    results: Arc<Mutex<Vec<SearchResult>>>,
    queries: Arc<Mutex<Vec<String>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockSearchClient {
    pub fn new() -> Self {
        Self {
            results: Arc::new(Mutex::new(Vec::new())),
            queries: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_results(self, results: Vec<SearchResult>) -> Self {
        *self.results.lock().unwrap() = results;
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn get_queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

impl Default for MockSearchClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchService for MockSearchClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        self.queries.lock().unwrap().push(query.to_string());

        if *self.should_fail.lock().unwrap() {
            return Err(Error::Search("Mock failure".to_string()));
        }

        Ok(self
            .results
            .lock()
            .unwrap()
            .iter()
            .take(max_results)
            .cloned()
            .collect())
    }
}
