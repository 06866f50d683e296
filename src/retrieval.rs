//! In-memory retrieval store.
//!
//! Documents are split into overlapping character windows. A query scores
//! each chunk by the share of distinct query terms it contains, so scores
//! fall in `[0, 1]` and are comparable against a fixed confidence
//! threshold.

use crate::collaborators::{Document, RetrievalStore, RetrievedChunk};
use crate::error::Result;
use std::collections::HashSet;
use tracing::debug;

pub const CHUNK_CHARS: usize = 500;
pub const CHUNK_OVERLAP: usize = 125;
pub const TOP_K: usize = 5;
const UNKNOWN_SOURCE: &str = "unknown";

/// Terms shorter than this are ignored when scoring.
const MIN_TERM_CHARS: usize = 2;

#[derive(Debug, Clone)]
struct Chunk {
    content: String,
    source: String,
    terms: HashSet<String>,
}

/// Chunked document store with lexical scoring.
#[derive(Debug, Default)]
pub struct LexicalStore {
    chunks: Vec<Chunk>,
}

impl LexicalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_CHARS)
        .map(str::to_lowercase)
        .collect()
}

/// Split `text` into windows of `size` chars, each starting `size - overlap`
/// chars after the previous one. Blank windows are dropped.
pub fn split_chunks(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = size.max(1);
    let step = size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_owned());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

impl RetrievalStore for LexicalStore {
    fn query(&mut self, text: &str) -> Result<Vec<RetrievedChunk>> {
        let query = terms(text);
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let mut hits: Vec<RetrievedChunk> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let shared = query.intersection(&chunk.terms).count();
                (shared > 0).then(|| RetrievedChunk {
                    content: chunk.content.clone(),
                    source: chunk.source.clone(),
                    score: shared as f32 / query.len() as f32,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(TOP_K);
        debug!(
            hits = hits.len(),
            best = hits.first().map_or(0.0, |h| h.score),
            "retrieval query"
        );
        Ok(hits)
    }

    fn add_document(&mut self, document: Document) -> Result<()> {
        let source = if document.source.trim().is_empty() {
            UNKNOWN_SOURCE.to_owned()
        } else {
            document.source
        };
        let before = self.chunks.len();
        for content in split_chunks(&document.content, CHUNK_CHARS, CHUNK_OVERLAP) {
            self.chunks.push(Chunk {
                terms: terms(&content),
                content,
                source: source.clone(),
            });
        }
        debug!(source = %source, added = self.chunks.len() - before, "document indexed");
        Ok(())
    }
}
