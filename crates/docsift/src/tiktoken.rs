//! Exact sub-word token counting via tiktoken (`tiktoken` feature).

use anyhow::Result;
use async_trait::async_trait;
use tiktoken_rs::CoreBPE;

use docsift_core::tokenize::Tokenizer;

/// Exact tokenizer backed by the cl100k_base encoding.
///
/// Deterministic like the approximation, but measures real model tokens.
/// Construction loads the vocabulary once; counting is then pure CPU.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            bpe: tiktoken_rs::cl100k_base()?,
        })
    }
}

#[async_trait]
impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_zero() {
        let t = TiktokenTokenizer::new().unwrap();
        assert_eq!(t.count_tokens(""), 0);
    }

    #[test]
    fn test_counts_are_positive_for_text() {
        let t = TiktokenTokenizer::new().unwrap();
        assert!(t.count_tokens("hello world") >= 2);
    }

    #[test]
    fn test_longer_text_counts_higher() {
        let t = TiktokenTokenizer::new().unwrap();
        let short = t.count_tokens("split the content");
        let long = t.count_tokens("split the content into ordered token-bounded chunks");
        assert!(long > short);
    }
}
