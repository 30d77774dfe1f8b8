//! Semantic chunking backed by a remote embedding endpoint.
//!
//! [`HttpSemanticChunker`] splits text into sentences, fetches an
//! embedding per sentence from an OpenAI-compatible endpoint, and starts
//! a new chunk whenever adjacent sentences drop below the configured
//! cosine-similarity threshold or the token budget would overflow.
//! Everything that can go wrong degrades to the structural
//! [`RegexChunker`] so callers always get chunks back.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use docsift_core::chunk::{split_sentences, Chunker, RegexChunker};
use docsift_core::models::DocChunk;
use docsift_core::tokenize::Tokenizer;

use crate::config::ChunkerConfig;
use crate::remote::{block_on, inside_runtime, RemoteClient};

/// Cosine similarity between two embedding vectors.
///
/// Returns 0.0 for mismatched lengths or zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Chunker that groups sentences by embedding similarity.
#[derive(Clone)]
pub struct HttpSemanticChunker {
    config: ChunkerConfig,
    fallback: Arc<dyn Chunker>,
    tokenizer: Arc<dyn Tokenizer>,
    client: RemoteClient,
}

impl HttpSemanticChunker {
    pub fn new(config: ChunkerConfig, tokenizer: Arc<dyn Tokenizer>) -> anyhow::Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("No endpoint configured for semantic chunker"))?;
        let client = RemoteClient::new(
            &endpoint,
            config.api_key.clone(),
            std::time::Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        let fallback = Arc::new(RegexChunker::new(Arc::clone(&tokenizer)));
        Ok(Self {
            config,
            fallback,
            tokenizer,
            client,
        })
    }

    async fn fetch_embeddings(&self, texts: &[&str]) -> Option<Vec<Vec<f32>>> {
        let body = json!({
            "input": texts,
            "model": self.config.model,
        });
        let response = self.client.post_with_retry("", &body).await?;
        parse_embeddings(&response, texts.len())
    }

    /// Walk the sentences, cutting a chunk boundary whenever the
    /// similarity to the previous sentence falls below the threshold or
    /// the accumulated group would exceed the token budget.
    fn group_by_similarity(
        &self,
        sentences: &[&str],
        embeddings: &[Vec<f32>],
        source: &str,
        max_chunk_tokens: usize,
    ) -> Vec<DocChunk> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = vec![sentences[0]];
        let mut current_tokens = self.tokenizer.count_tokens(sentences[0]);

        for i in 1..sentences.len() {
            let sentence = sentences[i];
            let sentence_tokens = self.tokenizer.count_tokens(sentence);
            let similarity = cosine_similarity(&embeddings[i - 1], &embeddings[i]);

            let should_split = similarity < self.config.threshold
                || current_tokens + sentence_tokens > max_chunk_tokens;

            if should_split && !current.is_empty() {
                chunks.push(DocChunk::new(current.join(" "), source, current_tokens));
                current.clear();
                current_tokens = 0;
            }

            current.push(sentence);
            current_tokens += sentence_tokens;
        }

        if !current.is_empty() {
            chunks.push(DocChunk::new(current.join(" "), source, current_tokens));
        }

        chunks
    }
}

/// Extract per-input embeddings from an API response.
///
/// Accepts the OpenAI shape (`data[].embedding`, reordered by `index`)
/// or a plain `embeddings` list of vectors. Returns `None` when fewer
/// vectors than inputs come back.
fn parse_embeddings(data: &Value, expected_count: usize) -> Option<Vec<Vec<f32>>> {
    let vector_of = |v: &Value| -> Option<Vec<f32>> {
        v.as_array()
            .map(|xs| xs.iter().filter_map(Value::as_f64).map(|x| x as f32).collect())
    };

    if let Some(results) = data.get("data").and_then(Value::as_array) {
        if results.len() < expected_count {
            return None;
        }
        let mut sorted: Vec<&Value> = results.iter().collect();
        sorted.sort_by_key(|r| r.get("index").and_then(Value::as_u64).unwrap_or(0));
        return sorted
            .iter()
            .take(expected_count)
            .map(|r| r.get("embedding").and_then(vector_of))
            .collect();
    }

    if let Some(embeddings) = data.get("embeddings").and_then(Value::as_array) {
        if embeddings.len() >= expected_count {
            return embeddings[..expected_count].iter().map(vector_of).collect();
        }
    }

    None
}

#[async_trait]
impl Chunker for HttpSemanticChunker {
    fn split(&self, content: &str, source: &str, max_chunk_tokens: usize) -> Vec<DocChunk> {
        if self.config.endpoint.is_none() || content.trim().is_empty() {
            return self.fallback.split(content, source, max_chunk_tokens);
        }

        // Never block an async scope; degrade to the structural chunker.
        if inside_runtime() {
            return self.fallback.split(content, source, max_chunk_tokens);
        }

        match block_on(self.split_async(content, source, max_chunk_tokens)) {
            Ok(chunks) => chunks,
            Err(_) => self.fallback.split(content, source, max_chunk_tokens),
        }
    }

    async fn split_async(
        &self,
        content: &str,
        source: &str,
        max_chunk_tokens: usize,
    ) -> Vec<DocChunk> {
        if self.config.endpoint.is_none() || content.trim().is_empty() {
            return self.fallback.split(content, source, max_chunk_tokens);
        }

        let sentences = split_sentences(content);
        if sentences.is_empty() {
            return Vec::new();
        }

        if sentences.len() == 1 {
            let tokens = self.tokenizer.count_tokens(sentences[0]);
            return vec![DocChunk::new(sentences[0], source, tokens)];
        }

        match self.fetch_embeddings(&sentences).await {
            Some(embeddings) => {
                self.group_by_similarity(&sentences, &embeddings, source, max_chunk_tokens)
            }
            None => self.fallback.split(content, source, max_chunk_tokens),
        }
    }
}
