//! Remote reranking with silent TF-IDF fallback.
//!
//! [`HttpReranker`] sends the chunk contents and query to an external
//! rerank endpoint. The request body is chosen by the configured format
//! (`cohere`, `openai`, or `custom`), and the response is normalized
//! across several vendor shapes. Any failure — retries exhausted, shape
//! not recognized, blocking call from inside a runtime — yields the
//! local fallback's ranking; the caller never sees a remote error.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use docsift_core::models::DocChunk;
use docsift_core::rank::Reranker;

use crate::config::RerankerConfig;
use crate::remote::{block_on, inside_runtime, RemoteClient};

/// Reranker that calls an external HTTP endpoint.
#[derive(Clone)]
pub struct HttpReranker {
    config: RerankerConfig,
    fallback: Arc<dyn Reranker>,
    client: RemoteClient,
}

impl HttpReranker {
    pub fn new(config: RerankerConfig, fallback: Arc<dyn Reranker>) -> anyhow::Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("No endpoint configured for HTTP reranker"))?;
        let client = RemoteClient::new(
            &endpoint,
            config.api_key.clone(),
            std::time::Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self {
            config,
            fallback,
            client,
        })
    }

    /// Build the request body for the configured wire format.
    ///
    /// - `cohere`: the `/v1/rerank` shape used by llama.cpp, vLLM, etc.
    /// - `openai`: custom OpenAI-style endpoints with a nested `input`.
    /// - `custom`: a flat generic shape carrying everything.
    fn build_request(&self, chunks: &[DocChunk], query: &str, top_k: usize) -> Value {
        let documents: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();

        match self.config.format.as_str() {
            "cohere" => json!({
                "model": self.config.model,
                "query": query,
                "documents": documents,
                "top_n": top_k,
                "return_documents": false,
            }),
            "openai" => json!({
                "model": self.config.model,
                "input": {
                    "query": query,
                    "documents": documents,
                },
                "top_k": top_k,
            }),
            _ => json!({
                "query": query,
                "documents": documents,
                "top_k": top_k,
                "model": self.config.model,
            }),
        }
    }

    /// Normalize a response into scored chunks.
    ///
    /// The result list may live under `results`, `data`, or `rankings`;
    /// per-result index under `index`, `document_index`, or `doc_id`;
    /// score under `relevance_score`, `score`, or `similarity`. The first
    /// present key wins. An empty or missing list degrades to the
    /// fallback's unscored head (vacuous-query behavior).
    fn parse_response(&self, data: &Value, chunks: &[DocChunk], top_k: usize) -> Vec<DocChunk> {
        let results = ["results", "data", "rankings"]
            .iter()
            .find_map(|key| data.get(*key).and_then(Value::as_array));

        let results = match results {
            Some(list) if !list.is_empty() => list,
            _ => return self.fallback.rerank(chunks, "", top_k),
        };

        let mut scored = Vec::new();
        for result in results.iter().take(top_k) {
            let index = ["index", "document_index", "doc_id"]
                .iter()
                .find_map(|key| result.get(*key).and_then(Value::as_u64))
                .unwrap_or(0) as usize;
            let score = ["relevance_score", "score", "similarity"]
                .iter()
                .find_map(|key| result.get(*key).and_then(Value::as_f64))
                .unwrap_or(0.0);

            if let Some(original) = chunks.get(index) {
                scored.push(original.with_score(score));
            }
        }

        scored
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    fn rerank(&self, chunks: &[DocChunk], query: &str, top_k: usize) -> Vec<DocChunk> {
        if self.config.endpoint.is_none() || chunks.is_empty() {
            return self.fallback.rerank(chunks, query, top_k);
        }

        // Never block an async scope; degrade to the local ranking instead.
        if inside_runtime() {
            return self.fallback.rerank(chunks, query, top_k);
        }

        match block_on(self.rerank_async(chunks, query, top_k)) {
            Ok(ranked) => ranked,
            Err(_) => self.fallback.rerank(chunks, query, top_k),
        }
    }

    async fn rerank_async(&self, chunks: &[DocChunk], query: &str, top_k: usize) -> Vec<DocChunk> {
        if self.config.endpoint.is_none() || chunks.is_empty() {
            return self.fallback.rerank(chunks, query, top_k);
        }

        let body = self.build_request(chunks, query, top_k);
        match self.client.post_with_retry("", &body).await {
            Some(response) => self.parse_response(&response, chunks, top_k),
            None => self.fallback.rerank(chunks, query, top_k),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsift_core::rank::TfidfReranker;

    fn reranker_with_format(format: &str) -> HttpReranker {
        let config = RerankerConfig {
            endpoint: Some("http://unused.invalid".to_string()),
            model: "rerank-test".to_string(),
            format: format.to_string(),
            ..RerankerConfig::default()
        };
        HttpReranker::new(config, Arc::new(TfidfReranker::new())).unwrap()
    }

    fn chunks() -> Vec<DocChunk> {
        vec![
            DocChunk::new("first chunk", "s", 2),
            DocChunk::new("second chunk", "s", 2),
            DocChunk::new("third chunk", "s", 2),
        ]
    }

    #[test]
    fn test_cohere_request_shape() {
        let r = reranker_with_format("cohere");
        let body = r.build_request(&chunks(), "my query", 2);
        assert_eq!(body["model"], "rerank-test");
        assert_eq!(body["query"], "my query");
        assert_eq!(body["top_n"], 2);
        assert_eq!(body["return_documents"], false);
        assert_eq!(body["documents"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_openai_request_shape() {
        let r = reranker_with_format("openai");
        let body = r.build_request(&chunks(), "my query", 2);
        assert_eq!(body["input"]["query"], "my query");
        assert_eq!(body["input"]["documents"].as_array().unwrap().len(), 3);
        assert_eq!(body["top_k"], 2);
    }

    #[test]
    fn test_custom_request_shape() {
        let r = reranker_with_format("custom");
        let body = r.build_request(&chunks(), "my query", 2);
        assert_eq!(body["query"], "my query");
        assert_eq!(body["top_k"], 2);
        assert_eq!(body["model"], "rerank-test");
    }

    #[test]
    fn test_parse_cohere_response_shape() {
        let r = reranker_with_format("cohere");
        let input = chunks();
        let data = json!({"results": [
            {"index": 2, "relevance_score": 0.9},
            {"index": 0, "relevance_score": 0.4},
        ]});
        let out = r.parse_response(&data, &input, 5);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "third chunk");
        assert!((out[0].score - 0.9).abs() < 1e-9);
        assert_eq!(out[1].content, "first chunk");
    }

    #[test]
    fn test_parse_alternate_response_shape() {
        let r = reranker_with_format("custom");
        let input = chunks();
        let data = json!({"rankings": [
            {"document_index": 1, "score": 0.7},
        ]});
        let out = r.parse_response(&data, &input, 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "second chunk");
        assert!((out[0].score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_parse_data_similarity_shape() {
        let r = reranker_with_format("custom");
        let input = chunks();
        let data = json!({"data": [
            {"doc_id": 0, "similarity": 0.3},
        ]});
        let out = r.parse_response(&data, &input, 5);
        assert_eq!(out.len(), 1);
        assert!((out[0].score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_index_is_skipped() {
        let r = reranker_with_format("cohere");
        let input = chunks();
        let data = json!({"results": [
            {"index": 99, "relevance_score": 0.9},
            {"index": 1, "relevance_score": 0.5},
        ]});
        let out = r.parse_response(&data, &input, 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "second chunk");
    }

    #[test]
    fn test_empty_result_list_degrades_to_fallback_head() {
        let r = reranker_with_format("cohere");
        let input = chunks();
        let out = r.parse_response(&json!({"results": []}), &input, 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "first chunk");
        assert!(out.iter().all(|c| c.score == 0.0));
    }

    #[test]
    fn test_parse_does_not_mutate_input() {
        let r = reranker_with_format("cohere");
        let input = chunks();
        let data = json!({"results": [{"index": 0, "relevance_score": 0.9}]});
        let _ = r.parse_response(&data, &input, 5);
        assert!(input.iter().all(|c| c.score == 0.0));
    }

    #[tokio::test]
    async fn test_sync_entry_inside_runtime_uses_fallback() {
        let r = reranker_with_format("cohere");
        let input = vec![
            DocChunk::new("tfidf relevance scoring", "s", 3),
            DocChunk::new("completely unrelated", "s", 2),
        ];
        let local = TfidfReranker::new().rerank(&input, "relevance scoring", 2);
        let out = r.rerank(&input, "relevance scoring", 2);
        assert_eq!(out, local);
    }
}
