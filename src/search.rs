//! Blocking [`SearchClient`] over the async `hark-search` crate.

use crate::collaborators::{Document, SearchClient};
use crate::config::SearchSettings;
use crate::error::{HarkError, Result};
use hark_search::SearchConfig;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info};

/// Web search driven on a private current-thread runtime.
pub struct WebSearch {
    runtime: Runtime,
    config: SearchConfig,
}

impl WebSearch {
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the runtime cannot start.
    pub fn new(settings: &SearchSettings) -> Result<Self> {
        let config = SearchConfig {
            endpoint: settings.endpoint.clone(),
            max_results: settings.max_results,
            timeout_seconds: settings.timeout_s,
            max_page_chars: settings.max_page_chars,
            user_agent: settings.user_agent.clone(),
            ..SearchConfig::default()
        };
        config.validate()?;
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| HarkError::Search(format!("search runtime failed to start: {e}")))?;
        Ok(Self { runtime, config })
    }
}

impl SearchClient for WebSearch {
    fn search(&mut self, query: &str) -> Result<Vec<String>> {
        let results = self
            .runtime
            .block_on(hark_search::search(query, &self.config))?;
        info!(query, results = results.len(), "web search");
        Ok(results.into_iter().map(|r| r.url).collect())
    }

    fn fetch(&mut self, urls: &[String]) -> Result<Vec<Document>> {
        let pages = self
            .runtime
            .block_on(hark_search::fetch_pages(urls, &self.config))?;
        debug!(requested = urls.len(), fetched = pages.len(), "search pages fetched");
        Ok(pages
            .into_iter()
            .map(|page| Document {
                content: page.text,
                source: page.url,
            })
            .collect())
    }
}
