//! Search configuration with defaults tuned for polite scraping.

use crate::error::SearchError;

/// HTML-only DuckDuckGo endpoint. Needs no JavaScript and tolerates
/// automated POSTs.
pub const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Desktop browser identity; the HTML endpoint serves a captcha to obvious bots.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Configuration for search and page fetching.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Search endpoint receiving the `q` form field.
    pub endpoint: String,
    /// Maximum number of result URLs returned.
    pub max_results: usize,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Whether to request safe search filtering.
    pub safe_search: bool,
    /// Characters of readable text kept per fetched page.
    pub max_page_chars: usize,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Accept-Language sent with every request; steers result language.
    pub accept_language: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            max_results: 5,
            timeout_seconds: 8,
            safe_search: true,
            max_page_chars: crate::content::DEFAULT_MAX_CHARS,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            accept_language: "en-US,en;q=0.9".to_owned(),
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `max_results` must be greater than 0
    /// - `timeout_seconds` must be greater than 0
    /// - `max_page_chars` must be greater than 0
    /// - `user_agent` and `accept_language` must be usable header values
    /// - `endpoint` must be an absolute http(s) URL
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_results == 0 {
            return Err(SearchError::Config(
                "max_results must be greater than 0".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.max_page_chars == 0 {
            return Err(SearchError::Config(
                "max_page_chars must be greater than 0".into(),
            ));
        }
        crate::http::header_value("user_agent", &self.user_agent)?;
        crate::http::header_value("accept_language", &self.accept_language)?;
        match url::Url::parse(&self.endpoint) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => Ok(()),
            _ => Err(SearchError::Config(format!(
                "endpoint is not an http(s) URL: {}",
                self.endpoint
            ))),
        }
    }
}
