use super::SearchService;
use crate::models::SearchResult;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://html.duckduckgo.com";

// The HTML endpoint serves a stripped page to clients that do not look like a browser
const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:140.0) Gecko/20100101 Firefox/140.0";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// General web search by scraping DuckDuckGo's HTML results page.
pub struct DuckDuckGoSearch {
    client: Client,
    base_url: String,
}

struct ResultSelectors {
    result: Selector,
    title: Selector,
    snippet: Selector,
    display_url: Selector,
}

impl ResultSelectors {
    fn new() -> Result<Self> {
        let parse = |css: &str| {
            Selector::parse(css)
                .map_err(|e| Error::Search(format!("Invalid selector '{}': {:?}", css, e)))
        };

        Ok(Self {
            result: parse(".web-result")?,
            title: parse(".result__a")?,
            snippet: parse(".result__snippet")?,
            display_url: parse(".result__url")?,
        })
    }
}

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self::new_with_client(Client::new())
    }

    pub fn new_with_client(client: Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new()
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result links point at a DuckDuckGo redirect carrying the target in `uddg`.
fn resolve_link(href: &str) -> Option<String> {
    let base = Url::parse(DEFAULT_BASE_URL).ok()?;
    let url = base.join(href).ok()?;

    if let Some((_, target)) = url.query_pairs().find(|(key, _)| key == "uddg") {
        return Some(target.into_owned());
    }

    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }

    None
}

fn parse_results(body: &str, max_results: usize) -> Result<Vec<SearchResult>> {
    let selectors = ResultSelectors::new()?;
    let document = Html::parse_document(body);

    let results = document
        .select(&selectors.result)
        .filter(|result| !result.value().classes().any(|class| class == "result--ad"))
        .filter_map(|result| {
            let anchor = result.select(&selectors.title).next()?;
            let title = element_text(anchor);
            if title.is_empty() {
                return None;
            }

            let link = anchor
                .value()
                .attr("href")
                .and_then(resolve_link)
                .or_else(|| {
                    let shown = result.select(&selectors.display_url).next().map(element_text)?;
                    (!shown.is_empty()).then(|| format!("https://{}", shown))
                })?;

            let snippet = result
                .select(&selectors.snippet)
                .next()
                .map(element_text)
                .unwrap_or_default();

            Some(SearchResult::new(title, snippet, link))
        })
        .take(max_results)
        .collect();

    Ok(results)
}

#[async_trait]
impl SearchService for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "DuckDuckGo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        tracing::debug!("Searching DuckDuckGo for '{}'", query);

        let response = self
            .client
            .get(format!("{}/html/", self.base_url))
            .timeout(Duration::from_secs(10))
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT)
            .header("Accept-Language", "en-US,en;q=0.5")
            .query(&[("q", query)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Search(format!("DuckDuckGo returned status {}", status)));
        }

        let body = response.text().await?;
        let results = parse_results(&body, max_results)?;

        if results.is_empty() && body.contains("anomaly") {
            tracing::warn!("DuckDuckGo served a bot check instead of results");
        }
        tracing::debug!("Parsed {} DuckDuckGo result(s)", results.len());

        Ok(results)
    }
}
