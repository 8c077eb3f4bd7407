use super::{SearchService, NOT_CONFIGURED_TITLE};
use crate::models::SearchResult;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com";
/// The Custom Search JSON API caps `num` at 10.
const MAX_PAGE_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<CustomSearchItem>,
}

#[derive(Debug, Deserialize)]
struct CustomSearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

/// Curated search through a Google Programmable Search Engine.
///
/// Needs both an API key and an engine id. Without them every search returns
/// a "not configured" notice instead of failing.
pub struct GoogleSearch {
    client: Client,
    credentials: Option<(String, String)>,
    base_url: String,
}

impl GoogleSearch {
    pub fn new(api_key: Option<String>, engine_id: Option<String>) -> Self {
        Self::new_with_client(api_key, engine_id, Client::new())
    }

    pub fn new_with_client(
        api_key: Option<String>,
        engine_id: Option<String>,
        client: Client,
    ) -> Self {
        let credentials = match (api_key, engine_id) {
            (Some(key), Some(cx)) if !key.is_empty() && !cx.is_empty() => Some((key, cx)),
            _ => {
                tracing::warn!(
                    "Google search selected but GOOGLE_CSE_API_KEY/GOOGLE_CSE_ID are missing"
                );
                None
            }
        };

        Self {
            client,
            credentials,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    fn not_configured() -> SearchResult {
        SearchResult::new(
            NOT_CONFIGURED_TITLE,
            "Google search credentials are not set, so no web results are available.",
            "",
        )
    }
}

#[async_trait]
impl SearchService for GoogleSearch {
    fn name(&self) -> &str {
        "Google"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let Some((api_key, engine_id)) = &self.credentials else {
            return Ok(vec![Self::not_configured()]);
        };

        let num = max_results.clamp(1, MAX_PAGE_SIZE).to_string();
        let url = format!("{}/customsearch/v1", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .query(&[
                ("key", api_key.as_str()),
                ("cx", engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Google search error (status {}): {}", status, error_text);
            return Err(Error::Search(format!(
                "Google search returned status {}",
                status
            )));
        }

        let body: CustomSearchResponse = response.json().await?;

        Ok(body
            .items
            .into_iter()
            .take(max_results)
            .map(|item| SearchResult::new(item.title, item.snippet, item.link))
            .collect())
    }
}
