//! Token counting.
//!
//! Defines the [`Tokenizer`] trait that all counting backends implement,
//! plus the always-available word-based approximation. An exact
//! sub-word tokenizer (tiktoken) and the remote HTTP backend live in the
//! `docsift` app crate; whenever neither is available the approximation
//! below is used identically, so counts are reproducible across
//! environments.

use async_trait::async_trait;

/// Punctuation characters that typically become their own tokens in
/// model vocabularies, especially in code.
const PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '{', '}', '"', '\'', '-', '=', '+', '*', '/',
    '<', '>', '@', '#', '$', '%', '^', '&', '|', '\\',
];

/// Approximate the token count of `text`.
///
/// `word_count + punctuation_count / 2`. More accurate than pure
/// character division, especially for code. Empty or all-whitespace
/// input yields 0.
///
/// # Example
///
/// ```rust
/// use docsift_core::tokenize::approx_token_count;
///
/// assert_eq!(approx_token_count(""), 0);
/// assert_eq!(approx_token_count("hello"), 1);
/// ```
pub fn approx_token_count(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let word_count = text.split_whitespace().count();
    let punctuation_count = text.chars().filter(|c| PUNCTUATION.contains(c)).count();
    word_count + punctuation_count / 2
}

/// Trait for token counting backends.
///
/// Counting is total: every implementation returns a count for any
/// string input, including empty or pure-whitespace. The async variants
/// default to the sync result so that local implementations stay pure;
/// remote backends override them with real async behavior.
#[async_trait]
pub trait Tokenizer: Send + Sync {
    /// Count tokens in `text`.
    fn count_tokens(&self, text: &str) -> usize;

    /// Async variant with identical semantics.
    async fn count_tokens_async(&self, text: &str) -> usize {
        self.count_tokens(text)
    }

    /// Count tokens for many texts.
    ///
    /// The default runs sequentially; remote backends override this with
    /// bounded-concurrency fan-out.
    async fn count_tokens_batch(&self, texts: &[String]) -> Vec<usize> {
        let mut counts = Vec::with_capacity(texts.len());
        for text in texts {
            counts.push(self.count_tokens_async(text).await);
        }
        counts
    }
}

/// The word-based approximate counting strategy.
///
/// Deterministic and dependency-free; the guaranteed fallback behind
/// every other tokenizer backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTokenizer;

#[async_trait]
impl Tokenizer for ApproxTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        approx_token_count(text)
    }
}
