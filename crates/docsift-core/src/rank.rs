//! TF-IDF relevance reranking.
//!
//! Scores each chunk against a query and returns the top-K by descending
//! score. "Document" here is one chunk and "corpus" is the chunk set of a
//! single call: the term index is rebuilt from scratch every time, because
//! the chunk set differs per call.
//!
//! # Scoring
//!
//! For every chunk, `tf(term) = occurrences / total_terms(chunk)` and
//! `idf(term) = ln((N + 1) / (df + 1)) + 1` (Laplace smoothed, so idf is
//! always positive and finite). The chunk score is the sum of `tf * idf`
//! over query terms present in the chunk; absent terms contribute 0, not
//! a penalty.
//!
//! Reranking never mutates its input: scored results are new [`DocChunk`]
//! values, and equal scores keep the original chunk order so output is
//! deterministic for a fixed input.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::models::DocChunk;

/// Common English stop-words filtered out of term extraction.
pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "can", "this",
    "that", "these", "those", "it", "its", "of", "in", "to", "for", "with", "on", "at", "by",
    "from", "as", "or", "and", "if", "then", "else", "when", "where", "which", "who", "what",
    "how", "all", "each", "every", "both", "few", "more", "most", "other", "some", "such", "no",
    "not", "only", "own", "same", "so", "than", "too", "very", "just", "also", "now", "here",
    "there", "but", "about", "into", "through", "during", "before", "after", "above", "below",
    "between", "under", "again", "further", "once",
];

/// Trait for reranking backends.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Return up to `top_k` chunks in descending relevance order.
    fn rerank(&self, chunks: &[DocChunk], query: &str, top_k: usize) -> Vec<DocChunk>;

    /// Async variant with identical semantics.
    async fn rerank_async(&self, chunks: &[DocChunk], query: &str, top_k: usize) -> Vec<DocChunk> {
        self.rerank(chunks, query, top_k)
    }
}

/// The local TF-IDF reranker.
pub struct TfidfReranker {
    stopwords: HashSet<String>,
}

impl TfidfReranker {
    /// Reranker with the built-in stop-word set.
    pub fn new() -> Self {
        Self {
            stopwords: STOPWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Reranker with a caller-supplied stop-word set.
    pub fn with_stopwords(stopwords: HashSet<String>) -> Self {
        Self { stopwords }
    }

    /// Extract scoring terms from text: lowercase maximal identifier runs
    /// (`[a-zA-Z_][a-zA-Z0-9_]*`), minus stop-words and terms of length
    /// <= 2. Pure numeric tokens never match, and an ASCII run adjacent to
    /// a non-ASCII letter or digit is no standalone word, so it never
    /// matches either (`café` yields nothing, not `caf`).
    pub fn extract_terms(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut terms = Vec::new();
        let mut word = String::new();
        let mut starts_like_identifier = false;
        let mut inside_wider_word = false;

        for c in lower.chars().chain(std::iter::once(' ')) {
            if c.is_ascii_alphanumeric() || c == '_' {
                if word.is_empty() {
                    starts_like_identifier = c.is_ascii_alphabetic() || c == '_';
                }
                word.push(c);
            } else if c.is_alphanumeric() {
                // Non-ASCII word character: no word boundary here, so the
                // runs on either side of it are fragments, not terms.
                inside_wider_word = true;
                word.clear();
            } else {
                if !word.is_empty()
                    && !inside_wider_word
                    && starts_like_identifier
                    && word.len() > 2
                    && !self.stopwords.contains(&word)
                {
                    terms.push(std::mem::take(&mut word));
                } else {
                    word.clear();
                }
                inside_wider_word = false;
            }
        }

        terms
    }

    /// TF-IDF similarity between a query and one chunk's term list.
    pub fn compute_tfidf_score(
        &self,
        query_terms: &[String],
        doc_terms: &[String],
        idf: &HashMap<String, f64>,
    ) -> f64 {
        if doc_terms.is_empty() || query_terms.is_empty() {
            return 0.0;
        }

        let mut tf: HashMap<&str, usize> = HashMap::new();
        for term in doc_terms {
            *tf.entry(term.as_str()).or_insert(0) += 1;
        }
        let doc_len = doc_terms.len() as f64;

        let mut score = 0.0;
        for term in query_terms {
            if let Some(&count) = tf.get(term.as_str()) {
                let term_freq = count as f64 / doc_len;
                let term_idf = idf.get(term).copied().unwrap_or(1.0);
                score += term_freq * term_idf;
            }
        }

        score
    }
}

impl Default for TfidfReranker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reranker for TfidfReranker {
    fn rerank(&self, chunks: &[DocChunk], query: &str, top_k: usize) -> Vec<DocChunk> {
        if chunks.is_empty() {
            return Vec::new();
        }

        let query_terms = self.extract_terms(query);
        if query_terms.is_empty() {
            // Degraded path for a vacuous query: first top_k, unscored.
            return chunks.iter().take(top_k).cloned().collect();
        }

        let doc_count = chunks.len();
        let mut term_doc_freq: HashMap<String, usize> = HashMap::new();
        let mut chunk_terms: Vec<Vec<String>> = Vec::with_capacity(doc_count);

        for chunk in chunks {
            let terms = self.extract_terms(&chunk.content);
            let unique: HashSet<&String> = terms.iter().collect();
            for term in unique {
                *term_doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            chunk_terms.push(terms);
        }

        // Laplace smoothing keeps idf positive even for ubiquitous terms.
        let idf: HashMap<String, f64> = term_doc_freq
            .into_iter()
            .map(|(term, df)| {
                let weight = ((doc_count as f64 + 1.0) / (df as f64 + 1.0)).ln() + 1.0;
                (term, weight)
            })
            .collect();

        let mut ranked: Vec<DocChunk> = chunks
            .iter()
            .zip(chunk_terms.iter())
            .map(|(chunk, terms)| {
                chunk.with_score(self.compute_tfidf_score(&query_terms, terms, &idf))
            })
            .collect();

        // Stable sort: equal scores keep original chunk order.
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_k);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str) -> DocChunk {
        DocChunk::new(content, "s", 1)
    }

    #[test]
    fn test_empty_chunks_yield_empty_result() {
        let r = TfidfReranker::new();
        assert!(r.rerank(&[], "query terms", 5).is_empty());
    }

    #[test]
    fn test_vacuous_query_returns_first_k_unscored() {
        let r = TfidfReranker::new();
        let chunks = vec![chunk("alpha"), chunk("beta"), chunk("gamma")];
        // Stop-words and short words only: no extractable terms.
        let out = r.rerank(&chunks, "the is of a", 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "alpha");
        assert_eq!(out[1].content, "beta");
        assert!(out.iter().all(|c| c.score == 0.0));
    }

    #[test]
    fn test_matching_chunk_ranks_first() {
        let r = TfidfReranker::new();
        let a = chunk("tokio spawns async tasks onto the runtime");
        let b = chunk("bread rises best near a warm window");
        let out = r.rerank(&[b.clone(), a.clone()], "async runtime tasks", 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, a.content);
        assert!(out[0].score > out[1].score);
        assert_eq!(out[1].score, 0.0);
    }

    #[test]
    fn test_input_chunks_are_not_mutated() {
        let r = TfidfReranker::new();
        let chunks = vec![
            chunk("relevance scoring with smoothing"),
            chunk("unrelated text entirely"),
        ];
        let _ = r.rerank(&chunks, "relevance scoring", 2);
        assert!(chunks.iter().all(|c| c.score == 0.0));
    }

    #[test]
    fn test_idempotent_for_fixed_input() {
        let r = TfidfReranker::new();
        let chunks = vec![
            chunk("parsing configuration files"),
            chunk("parsing query strings"),
            chunk("unrelated"),
        ];
        let first = r.rerank(&chunks, "parsing query", 3);
        let second = r.rerank(&chunks, "parsing query", 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_equal_scores_keep_original_order() {
        let r = TfidfReranker::new();
        let chunks = vec![
            chunk("nothing matching one"),
            chunk("nothing matching two"),
            chunk("nothing matching three"),
        ];
        let out = r.rerank(&chunks, "zebra", 3);
        let order: Vec<&str> = out.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(
            order,
            vec!["nothing matching one", "nothing matching two", "nothing matching three"]
        );
    }

    #[test]
    fn test_top_k_truncates() {
        let r = TfidfReranker::new();
        let chunks: Vec<DocChunk> = (0..10).map(|i| chunk(&format!("chunk number {i}"))).collect();
        assert_eq!(r.rerank(&chunks, "chunk", 3).len(), 3);
    }

    #[test]
    fn test_extract_terms_filters_stopwords_and_short_words() {
        let r = TfidfReranker::new();
        let terms = r.extract_terms("The quick fn is on a log2 path");
        assert_eq!(terms, vec!["quick", "log2", "path"]);
    }

    #[test]
    fn test_extract_terms_keeps_underscore_identifiers() {
        let r = TfidfReranker::new();
        let terms = r.extract_terms("call max_chunk_tokens before _internal_use");
        assert!(terms.contains(&"max_chunk_tokens".to_string()));
        assert!(terms.contains(&"_internal_use".to_string()));
    }

    #[test]
    fn test_extract_terms_drops_pure_numbers() {
        let r = TfidfReranker::new();
        let terms = r.extract_terms("version 2024 release 404 notes");
        assert_eq!(terms, vec!["version", "release", "notes"]);
    }

    #[test]
    fn test_extract_terms_skips_words_with_non_ascii_letters() {
        let r = TfidfReranker::new();
        // No word boundary inside a Unicode word: neither the leading nor
        // the trailing ASCII fragment is a term.
        assert!(r.extract_terms("café").is_empty());
        assert!(r.extract_terms("éclair").is_empty());
        assert!(r.extract_terms("naïve").is_empty());
        assert_eq!(r.extract_terms("café menu"), vec!["menu"]);
    }

    #[test]
    fn test_extract_terms_non_word_punctuation_is_a_boundary() {
        let r = TfidfReranker::new();
        assert_eq!(r.extract_terms("caf\u{2014}menu"), vec!["caf", "menu"]);
    }

    #[test]
    fn test_idf_positive_even_for_ubiquitous_terms() {
        let r = TfidfReranker::new();
        let chunks = vec![
            chunk("shared token everywhere"),
            chunk("shared token everywhere"),
            chunk("shared token everywhere"),
        ];
        let out = r.rerank(&chunks, "shared token", 3);
        assert!(out.iter().all(|c| c.score > 0.0));
    }

    #[test]
    fn test_score_matches_hand_computed_value() {
        let r = TfidfReranker::new();
        // One chunk: N = 1, df(term) = 1 -> idf = ln(2/2) + 1 = 1.0.
        // Doc terms: ["alpha", "beta"], tf(alpha) = 1/2.
        let chunks = vec![chunk("alpha beta")];
        let out = r.rerank(&chunks, "alpha", 1);
        assert!((out[0].score - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_async_variant_matches_sync() {
        let r = TfidfReranker::new();
        let chunks = vec![chunk("async bridging works"), chunk("other text")];
        let sync = r.rerank(&chunks, "async bridging", 2);
        let asynced = r.rerank_async(&chunks, "async bridging", 2).await;
        assert_eq!(sync, asynced);
    }
}
