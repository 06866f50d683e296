//! # hark-search
//!
//! Keyless web search for the hark voice assistant: queries the DuckDuckGo
//! HTML endpoint, then fetches result pages and reduces them to readable
//! text for retrieval.
//!
//! All entry points are async. Callers outside a runtime drive them with
//! `block_on` on a small current-thread runtime.

pub mod config;
pub mod content;
pub mod duckduckgo;
pub mod error;
pub mod http;
pub mod types;

pub use config::{DEFAULT_ENDPOINT, DEFAULT_USER_AGENT, SearchConfig};
pub use error::{Result, SearchError};
pub use types::{PageContent, SearchResult};

/// Search for `query` and return up to `config.max_results` organic results.
///
/// # Errors
///
/// Returns [`SearchError::Config`] for an invalid config or blank query, and
/// the request error otherwise.
pub async fn search(query: &str, config: &SearchConfig) -> Result<Vec<SearchResult>> {
    config.validate()?;
    let query = query.trim();
    if query.is_empty() {
        return Err(SearchError::Config("query must not be empty".into()));
    }
    duckduckgo::search(query, config).await
}

/// Fetch one page and extract its readable text.
///
/// # Errors
///
/// Returns an HTTP error for failed or non-success responses and
/// [`SearchError::Parse`] when the page has no readable text.
pub async fn fetch_page_content(url: &str, config: &SearchConfig) -> Result<PageContent> {
    let client = http::build_client(config)?;
    fetch_with(&client, url, config.max_page_chars).await
}

/// Fetch all `urls` concurrently. Pages that fail are logged and left out;
/// the rest keep their input order.
///
/// # Errors
///
/// Returns an error only if the HTTP client cannot be built.
pub async fn fetch_pages(urls: &[String], config: &SearchConfig) -> Result<Vec<PageContent>> {
    let client = http::build_client(config)?;
    let fetches = urls
        .iter()
        .map(|url| fetch_with(&client, url, config.max_page_chars));
    let outcomes = futures::future::join_all(fetches).await;

    let mut pages = Vec::with_capacity(outcomes.len());
    for (url, outcome) in urls.iter().zip(outcomes) {
        match outcome {
            Ok(page) => pages.push(page),
            Err(e) => tracing::warn!(url = %url, error = %e, "page fetch failed"),
        }
    }
    tracing::debug!(requested = urls.len(), fetched = pages.len(), "pages fetched");
    Ok(pages)
}

async fn fetch_with(client: &reqwest::Client, url: &str, max_chars: usize) -> Result<PageContent> {
    let html = http::read_text(client.get(url), "page").await?;
    content::extract_content(&html, url, max_chars)
}
