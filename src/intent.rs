//! Search-intent classification.
//!
//! A cheap keyword heuristic decides whether a query should be augmented with
//! web search results. No stemming or tokenization: a keyword matches when it
//! occurs anywhere in the lowercased query.

pub const SEARCH_KEYWORDS: [&str; 5] = ["what is", "latest", "news", "find", "search"];

/// Returns `true` when the query contains any search keyword.
pub fn needs_search(query: &str) -> bool {
    let lowered = query.to_lowercase();
    SEARCH_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}
