//! Remote token counting with silent local fallback.
//!
//! [`HttpTokenizer`] asks an OpenAI-compatible embeddings endpoint for a
//! token count and accepts several response shapes. Every failure path —
//! missing endpoint, retries exhausted, unrecognized shape, blocking call
//! from inside a runtime — produces the local fallback's count instead of
//! an error.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use docsift_core::tokenize::Tokenizer;

use crate::config::TokenizerConfig;
use crate::remote::{block_on, inside_runtime, RemoteClient, MAX_CONCURRENT_REQUESTS};

/// Tokenizer that calls an external HTTP endpoint.
#[derive(Clone)]
pub struct HttpTokenizer {
    config: TokenizerConfig,
    fallback: Arc<dyn Tokenizer>,
    client: RemoteClient,
}

impl HttpTokenizer {
    /// Requires `config.endpoint`; other failures at construction are the
    /// factory's concern (it degrades to the fallback).
    pub fn new(config: TokenizerConfig, fallback: Arc<dyn Tokenizer>) -> anyhow::Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("No endpoint configured for HTTP tokenizer"))?;
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

    /// Extract a token count from a response, first-present-wins:
    /// `usage.prompt_tokens`, a `tokens` list (length), then the direct
    /// count fields. Unrecognized shapes fall back to the local count.
    fn extract_token_count(&self, data: &Value, text: &str) -> usize {
        if let Some(usage) = data.get("usage") {
            return usage
                .get("prompt_tokens")
                .and_then(Value::as_u64)
                .unwrap_or(0) as usize;
        }

        if let Some(tokens) = data.get("tokens").and_then(Value::as_array) {
            return tokens.len();
        }

        for field in ["token_count", "count", "num_tokens", "length"] {
            if let Some(count) = data.get(field).and_then(Value::as_u64) {
                return count as usize;
            }
        }

        self.fallback.count_tokens(text)
    }
}

#[async_trait]
impl Tokenizer for HttpTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        if self.config.endpoint.is_none() {
            return self.fallback.count_tokens(text);
        }

        // Never block an async scope; degrade to the local count instead.
        if inside_runtime() {
            return self.fallback.count_tokens(text);
        }

        match block_on(self.count_tokens_async(text)) {
            Ok(count) => count,
            Err(_) => self.fallback.count_tokens(text),
        }
    }

    async fn count_tokens_async(&self, text: &str) -> usize {
        if self.config.endpoint.is_none() {
            return self.fallback.count_tokens(text);
        }

        let body = json!({
            "input": text,
            "model": self.config.model,
            "encoding_format": "float",
        });

        match self.client.post_with_retry("", &body).await {
            Some(response) => self.extract_token_count(&response, text),
            None => self.fallback.count_tokens(text),
        }
    }

    /// Concurrent batch counting, fan-out bounded by a semaphore.
    async fn count_tokens_batch(&self, texts: &[String]) -> Vec<usize> {
        if self.config.endpoint.is_none() {
            return texts.iter().map(|t| self.fallback.count_tokens(t)).collect();
        }

        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS));
        let mut tasks = JoinSet::new();

        for (index, text) in texts.iter().enumerate() {
            let this = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let text = text.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (index, this.count_tokens_async(&text).await)
            });
        }

        let mut counts = vec![0usize; texts.len()];
        while let Some(result) = tasks.join_next().await {
            if let Ok((index, count)) = result {
                counts[index] = count;
            }
        }
        counts
    }
}
