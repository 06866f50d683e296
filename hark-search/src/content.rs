//! Readable text extraction from fetched HTML pages.
//!
//! Text is taken from the first non-empty content root (`article`, `main`,
//! `[role="main"]`, then `body`). Text nested under boilerplate elements
//! such as scripts, navigation and footers is skipped.

use crate::error::{Result, SearchError};
use crate::types::PageContent;
use scraper::{ElementRef, Html, Node, Selector};

/// Default maximum characters kept from a page.
pub const DEFAULT_MAX_CHARS: usize = 20_000;

const CONTENT_ROOTS: &[&str] = &["article", "main", "[role=\"main\"]", "body"];

const BOILERPLATE: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "svg", "iframe", "form",
    "template",
];

/// Extract readable text from `html`, keeping at most `max_chars` characters.
///
/// # Errors
///
/// Returns [`SearchError::Parse`] if no readable text is found.
pub fn extract_content(html: &str, url: &str, max_chars: usize) -> Result<PageContent> {
    let document = Html::parse_document(html);

    let title = extract_title(&document);
    let text = CONTENT_ROOTS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|sel| {
            let text = document.select(&sel).next().map(readable_text)?;
            (!text.is_empty()).then_some(text)
        })
        .ok_or_else(|| SearchError::Parse("no extractable content found".into()))?;

    let text = truncate_chars(text, max_chars);
    let word_count = text.split_whitespace().count();

    Ok(PageContent {
        url: url.to_owned(),
        title,
        text,
        word_count,
    })
}

fn extract_title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|t| collapse_whitespace(&t))
        .unwrap_or_default()
}

/// Whitespace-collapsed text under `root`, boilerplate excluded.
fn readable_text(root: ElementRef<'_>) -> String {
    let mut pieces = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let in_boilerplate = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| BOILERPLATE.contains(&e.name()))
        });
        if !in_boilerplate {
            pieces.push(&**text);
        }
    }
    collapse_whitespace(&pieces.join(" "))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].trim_end().to_owned(),
        None => text,
    }
}
