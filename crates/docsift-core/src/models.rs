//! Core data models used throughout docsift.
//!
//! These types represent the excerpts that flow through the segmentation
//! and reranking pipeline.

use serde::{Deserialize, Serialize};

/// A bounded excerpt of source text with token count and relevance score.
///
/// Produced by a [`Chunker`](crate::chunk::Chunker) with `score = 0.0`.
/// Reranking never mutates a chunk in place; scored results are fresh
/// instances, so a caller's chunks are valid for repeated ranking calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocChunk {
    /// The text content of the chunk.
    pub content: String,
    /// Origin identifier (e.g. a connector or library name; may be empty).
    pub source: String,
    /// Token count as measured by the tokenizer that produced the chunk.
    pub tokens: usize,
    /// Relevance score assigned by reranking (0.0 until ranked).
    pub score: f64,
}

impl DocChunk {
    /// Create an unscored chunk.
    pub fn new(content: impl Into<String>, source: impl Into<String>, tokens: usize) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            tokens,
            score: 0.0,
        }
    }

    /// Copy of this chunk carrying a new relevance score.
    pub fn with_score(&self, score: f64) -> Self {
        Self {
            content: self.content.clone(),
            source: self.source.clone(),
            tokens: self.tokens,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_chunk_is_unscored() {
        let c = DocChunk::new("fn main() {}", "docs", 4);
        assert_eq!(c.score, 0.0);
        assert_eq!(c.tokens, 4);
    }

    #[test]
    fn test_with_score_leaves_original_untouched() {
        let c = DocChunk::new("text", "", 1);
        let scored = c.with_score(0.8);
        assert_eq!(c.score, 0.0);
        assert_eq!(scored.score, 0.8);
        assert_eq!(scored.content, c.content);
    }
}
