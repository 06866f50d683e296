//! DuckDuckGo HTML endpoint scraper.
//!
//! Queries are POSTed as a form to the HTML-only endpoint, which needs no
//! JavaScript. Result links come wrapped in a `/l/?uddg=` redirect that is
//! unwrapped before the URL is returned.

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::http;
use crate::types::SearchResult;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Query the configured endpoint and parse the organic results.
///
/// # Errors
///
/// Returns [`SearchError::Http`] or [`SearchError::Timeout`] when the request
/// fails, and [`SearchError::Parse`] when the page cannot be read.
pub async fn search(query: &str, config: &SearchConfig) -> Result<Vec<SearchResult>> {
    tracing::trace!(query, "DuckDuckGo search");

    let client = http::build_client(config)?;

    let mut params = vec![("q", query)];
    if config.safe_search {
        params.push(("kp", "1"));
    }

    let html = http::read_text(client.post(&config.endpoint).form(&params), "DuckDuckGo").await?;

    tracing::trace!(bytes = html.len(), "DuckDuckGo response received");

    parse_results(&html, config.max_results)
}

/// Extract the target URL from DuckDuckGo's redirect wrapper.
///
/// DDG wraps URLs like `//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com&rut=...`.
/// Direct absolute links are returned as they are.
fn unwrap_redirect(href: &str) -> Option<String> {
    let full_href = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_owned()
    };

    let parsed = Url::parse(&full_href).ok()?;
    let is_ddg = parsed
        .host_str()
        .is_some_and(|h| h == "duckduckgo.com" || h.ends_with(".duckduckgo.com"));

    if is_ddg && parsed.path().starts_with("/l/") {
        parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned())
    } else if matches!(parsed.scheme(), "http" | "https") {
        Some(full_href)
    } else {
        None
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SearchError::Parse(format!("invalid selector {css}: {e:?}")))
}

/// Parse a results page. Ads and repeated URLs are skipped.
pub(crate) fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchResult>> {
    let document = Html::parse_document(html);

    let result_sel = selector(
        ".result.results_links.results_links_deep:not(.result--ad), .web-result:not(.result--ad)",
    )?;
    let title_sel = selector(".result__a")?;
    let snippet_sel = selector(".result__snippet")?;

    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for element in document.select(&result_sel) {
        let Some(title_el) = element.select(&title_sel).next() else {
            continue;
        };

        let title = title_el.text().collect::<String>().trim().to_owned();
        if title.is_empty() {
            continue;
        }

        let Some(url) = title_el.value().attr("href").and_then(unwrap_redirect) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_owned())
            .unwrap_or_default();

        results.push(SearchResult {
            title,
            url,
            snippet,
        });

        if results.len() >= max_results {
            break;
        }
    }

    tracing::debug!(count = results.len(), "DuckDuckGo results parsed");
    Ok(results)
}
