//! Web search augmentation
//!
//! Search is advisory: providers may fail, be unconfigured, or return
//! nothing, and the pipeline still answers. [`search_or_notice`] is the single
//! boundary that turns provider errors into a visible notice result.

pub mod duckduckgo;
pub mod google;
pub mod mock;

pub use duckduckgo::DuckDuckGoSearch;
pub use google::GoogleSearch;
pub use mock::MockSearchClient;

use crate::models::SearchResult;
use crate::Result;
use async_trait::async_trait;
use tokio_retry::{strategy::FixedInterval, Retry};

pub const NO_RESULTS: &str = "No results found.";
pub const UNAVAILABLE_TITLE: &str = "Search unavailable";
pub const NOT_CONFIGURED_TITLE: &str = "Search not configured";

#[async_trait]
pub trait SearchService: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>>;
}

/// Runs a search, retrying a failed call once, and degrades any remaining
/// failure to a single "search unavailable" result.
pub async fn search_or_notice(
    service: &dyn SearchService,
    query: &str,
    max_results: usize,
) -> Vec<SearchResult> {
    let retry_strategy = FixedInterval::from_millis(250).take(1);

    match Retry::spawn(retry_strategy, || service.search(query, max_results)).await {
        Ok(results) => {
            tracing::info!(
                "{} search returned {} result(s)",
                service.name(),
                results.len()
            );
            results
        }
        Err(e) => {
            tracing::warn!("{} search failed: {}", service.name(), e);
            vec![SearchResult::new(
                UNAVAILABLE_TITLE,
                format!("Web search is currently unavailable ({}).", e),
                "",
            )]
        }
    }
}

/// Renders results as numbered markdown blocks in rank order.
///
/// Never returns an empty string: an empty set renders as [`NO_RESULTS`].
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return NO_RESULTS.to_string();
    }

    results
        .iter()
        .enumerate()
        .map(|(idx, result)| {
            let source = if result.source_url.is_empty() {
                "unavailable".to_string()
            } else {
                format!("[{0}]({0})", result.source_url)
            };
            format!(
                "**Result {}**:\n- **Title**: {}\n- **Snippet**: {}\n- **Source**: {}\n",
                idx + 1,
                result.title,
                result.snippet,
                source
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
