//! Hierarchical, token-budget-aware text segmentation.
//!
//! Splits document text into [`DocChunk`]s that respect a `max_chunk_tokens`
//! budget, preferring document structure over arbitrary length.
//!
//! # Algorithm
//!
//! 1. **Structural split** — divide the text at heading lines (1–3 `#`
//!    followed by whitespace) and blank-line runs. Each section is a
//!    candidate unit.
//! 2. **Greedy accumulation** — walk sections in order, appending to the
//!    current chunk while `current + section <= max_chunk_tokens`.
//!    Adjacent small sections are merged; a full chunk is flushed and a
//!    new one started.
//! 3. **Sentence fallback** — a section that alone exceeds the budget is
//!    split at sentence-ending punctuation and re-accumulated at sentence
//!    granularity. A single sentence that still exceeds the budget is
//!    emitted as its own over-budget chunk; this is the only case where
//!    the budget may be exceeded.
//!
//! Chunks come out in source order with no overlap; every non-blank piece
//! of the input lands in exactly one chunk. Segmentation is total — empty
//! or all-blank input yields an empty Vec, and there is no failure mode.

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::DocChunk;
use crate::tokenize::{ApproxTokenizer, Tokenizer};

/// Trait for segmentation backends.
#[async_trait]
pub trait Chunker: Send + Sync {
    /// Split `content` into an ordered sequence of token-bounded chunks.
    fn split(&self, content: &str, source: &str, max_chunk_tokens: usize) -> Vec<DocChunk>;

    /// Async variant with identical semantics.
    async fn split_async(&self, content: &str, source: &str, max_chunk_tokens: usize) -> Vec<DocChunk> {
        self.split(content, source, max_chunk_tokens)
    }
}

/// The local structural segmenter.
///
/// Measures every unit with the injected [`Tokenizer`]; the tokenizer is
/// the only collaborator, so the chunker stays pure and deterministic for
/// a deterministic tokenizer.
pub struct RegexChunker {
    tokenizer: Arc<dyn Tokenizer>,
}

impl RegexChunker {
    pub fn new(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }

    /// Split an oversized section at sentence boundaries and greedily
    /// re-accumulate under the budget.
    fn split_by_sentences(
        &self,
        section: &str,
        source: &str,
        max_chunk_tokens: usize,
    ) -> Vec<DocChunk> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0usize;

        for sentence in split_sentences(section) {
            let sentence_tokens = self.tokenizer.count_tokens(sentence);
            if current_tokens + sentence_tokens <= max_chunk_tokens {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(sentence);
                current_tokens += sentence_tokens;
            } else {
                if !current.is_empty() {
                    chunks.push(DocChunk::new(current.clone(), source, current_tokens));
                    current.clear();
                }
                // An oversized lone sentence is held whole and emitted
                // as its own chunk on the next flush.
                current.push_str(sentence);
                current_tokens = sentence_tokens;
            }
        }

        if !current.is_empty() {
            chunks.push(DocChunk::new(current, source, current_tokens));
        }

        chunks
    }
}

impl Default for RegexChunker {
    fn default() -> Self {
        Self::new(Arc::new(ApproxTokenizer))
    }
}

#[async_trait]
impl Chunker for RegexChunker {
    fn split(&self, content: &str, source: &str, max_chunk_tokens: usize) -> Vec<DocChunk> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0usize;

        for section in split_sections(content) {
            let section_tokens = self.tokenizer.count_tokens(&section);

            if current_tokens + section_tokens <= max_chunk_tokens {
                if !current.is_empty() {
                    current.push_str("\n\n");
                }
                current.push_str(&section);
                current_tokens += section_tokens;
            } else {
                if !current.is_empty() {
                    chunks.push(DocChunk::new(current.clone(), source, current_tokens));
                    current.clear();
                    current_tokens = 0;
                }

                if section_tokens <= max_chunk_tokens {
                    current.push_str(&section);
                    current_tokens = section_tokens;
                } else {
                    chunks.extend(self.split_by_sentences(&section, source, max_chunk_tokens));
                }
            }
        }

        if !current.is_empty() {
            chunks.push(DocChunk::new(current, source, current_tokens));
        }

        chunks
    }
}

/// True for a heading line: 1–3 `#` followed by whitespace.
fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=3).contains(&hashes)
        && line[hashes..]
            .chars()
            .next()
            .is_some_and(|c| c == ' ' || c == '\t')
}

/// Divide text into trimmed, non-empty sections at structural boundaries:
/// heading lines and blank-line runs.
fn split_sections(content: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();

    let mut flush = |buf: &mut String| {
        let trimmed = buf.trim();
        if !trimmed.is_empty() {
            sections.push(trimmed.to_string());
        }
        buf.clear();
    };

    for line in content.lines() {
        if line.trim().is_empty() {
            flush(&mut current);
        } else if is_heading(line) && !current.trim().is_empty() {
            flush(&mut current);
            current.push_str(line);
            current.push('\n');
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    flush(&mut current);

    sections
}

/// Split text at sentence-ending punctuation (`.` `!` `?`) followed by
/// whitespace. The trailing whitespace is consumed; the punctuation stays
/// with its sentence.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(_, next)) = chars.peek() {
                if next.is_whitespace() {
                    let end = i + c.len_utf8();
                    if end > start {
                        sentences.push(&text[start..end]);
                    }
                    // Consume the whitespace run.
                    while chars.peek().is_some_and(|&(_, n)| n.is_whitespace()) {
                        chars.next();
                    }
                    start = chars.peek().map_or(text.len(), |&(j, _)| j);
                }
            }
        }
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> RegexChunker {
        RegexChunker::default()
    }

    #[test]
    fn test_empty_content_yields_no_chunks() {
        assert!(chunker().split("", "s", 1000).is_empty());
    }

    #[test]
    fn test_blank_content_yields_no_chunks() {
        assert!(chunker().split(" \n\n ", "s", 1000).is_empty());
    }

    #[test]
    fn test_small_sections_merge_into_one_chunk() {
        // Both headed sections fit the budget together, so the greedy
        // accumulator merges across the structural boundary.
        let chunks = chunker().split("# H1\nfoo bar.\n\n# H2\nbaz qux.", "s", 1000);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("foo bar."));
        assert!(chunks[0].content.contains("baz qux."));
        assert_eq!(chunks[0].source, "s");
        assert_eq!(chunks[0].score, 0.0);
    }

    #[test]
    fn test_headings_split_when_budget_forces_it() {
        let content = "# Alpha\none two three four five\n\n# Beta\nsix seven eight nine ten";
        let chunks = chunker().split(content, "s", 8);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].content.starts_with("# Alpha"));
        assert!(chunks[1].content.starts_with("# Beta"));
    }

    #[test]
    fn test_four_hashes_is_not_a_structural_boundary() {
        let chunks = chunker().split("intro line\n#### deep heading\nmore text", "s", 1000);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].content.contains("#### deep heading"));
    }

    #[test]
    fn test_chunks_respect_budget() {
        let content = (0..40)
            .map(|i| format!("Paragraph number {i} with a few more words in it."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let max = 25;
        let chunks = chunker().split(&content, "s", max);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.tokens <= max, "chunk over budget: {}", chunk.tokens);
        }
    }

    #[test]
    fn test_oversized_section_falls_back_to_sentences() {
        let section = "First sentence here. Second sentence here. Third sentence here. \
                       Fourth sentence here. Fifth sentence here.";
        let chunks = chunker().split(section, "s", 7);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.tokens <= 7);
        }
    }

    #[test]
    fn test_oversized_single_sentence_is_emitted_whole() {
        let sentence = "one two three four five six seven eight nine ten.";
        let chunks = chunker().split(sentence, "s", 3);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, sentence);
        assert!(chunks[0].tokens > 3);
    }

    #[test]
    fn test_order_and_coverage_preserved() {
        let content = "# One\nalpha beta\n\n# Two\ngamma delta\n\n# Three\nepsilon zeta";
        let chunks = chunker().split(content, "s", 4);
        let joined: String = chunks
            .iter()
            .map(|c| c.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        for word in ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"] {
            assert_eq!(joined.matches(word).count(), 1, "missing or duplicated {word}");
        }
        let alpha = joined.find("alpha").unwrap();
        let gamma = joined.find("gamma").unwrap();
        let epsilon = joined.find("epsilon").unwrap();
        assert!(alpha < gamma && gamma < epsilon);
    }

    #[test]
    fn test_deterministic() {
        let content = "# A\nfoo bar baz\n\n# B\nqux quux\n\nplain paragraph here.";
        let a = chunker().split(content, "s", 5);
        let b = chunker().split(content, "s", 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_sentences_basic() {
        let s = split_sentences("One. Two! Three? Four");
        assert_eq!(s, vec!["One.", "Two!", "Three?", "Four"]);
    }

    #[test]
    fn test_split_sentences_keeps_abbrev_free_interior_dots() {
        // No whitespace after the dot, so no split.
        let s = split_sentences("see foo.bar for details. done");
        assert_eq!(s, vec!["see foo.bar for details.", "done"]);
    }

    #[test]
    fn test_split_sections_heading_and_blank_boundaries() {
        let sections = split_sections("intro\n## Sub\nbody\n\n\ntail");
        assert_eq!(sections, vec!["intro", "## Sub\nbody", "tail"]);
    }

    #[tokio::test]
    async fn test_async_variant_matches_sync() {
        let c = chunker();
        let content = "# H\none two three";
        assert_eq!(c.split_async(content, "s", 10).await, c.split(content, "s", 10));
    }
}
