//! Search result and fetched page types.

use serde::{Deserialize, Serialize};

/// A single organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    /// Target URL with any redirect wrapper removed.
    pub url: String,
    /// Text snippet shown under the result.
    pub snippet: String,
}

/// Readable text extracted from a fetched page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    /// Contents of `<title>`, empty when missing.
    pub title: String,
    /// Boilerplate-free text, whitespace-normalised and truncated.
    pub text: String,
    pub word_count: usize,
}
