//! Error types for the hark-search crate.
//!
//! Messages never contain query text beyond what the caller passed in.

/// Errors that can occur during web search operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request did not complete within the configured timeout.
    #[error("search timed out: {0}")]
    Timeout(String),

    /// An HTTP request failed or returned an error status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The response HTML could not be parsed or held no content.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl SearchError {
    pub(crate) fn from_reqwest(context: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(format!("{context}: {err}"))
        } else {
            Self::Http(format!("{context}: {err}"))
        }
    }
}

/// Convenience type alias for hark-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
