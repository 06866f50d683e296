//! HTTP plumbing shared by the search POST and the page fetches.
//!
//! One client is built per call into the crate, so a search round reuses a
//! single connection pool for the endpoint and every result page.

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::time::Duration;

const CONNECT_TIMEOUT_S: u64 = 5;
const MAX_REDIRECTS: usize = 5;

/// Build a client carrying the configured identity headers and timeouts.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if a header value is malformed and
/// [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(config: &SearchConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT_LANGUAGE,
        header_value("accept_language", &config.accept_language)?,
    );

    reqwest::Client::builder()
        .user_agent(header_value("user_agent", &config.user_agent)?)
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_seconds))
        .connect_timeout(Duration::from_secs(config.timeout_seconds.min(CONNECT_TIMEOUT_S)))
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

pub(crate) fn header_value(field: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| SearchError::Config(format!("{field} is not a valid header value")))
}

/// Send `request` and return the body of a 2xx response. `what` names the
/// request in error messages.
///
/// # Errors
///
/// Returns [`SearchError::Timeout`] or [`SearchError::Http`] for transport
/// failures and [`SearchError::Http`] for non-success statuses.
pub async fn read_text(request: reqwest::RequestBuilder, what: &str) -> Result<String> {
    let response = request
        .send()
        .await
        .map_err(|e| SearchError::from_reqwest(&format!("{what} request failed"), &e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(SearchError::Http(format!("{what} returned {status}")));
    }
    response
        .text()
        .await
        .map_err(|e| SearchError::from_reqwest(&format!("{what} read failed"), &e))
}
