//! HTTP gateway for remote backends.
//!
//! [`RemoteClient`] wraps a `reqwest::Client` with bearer auth, a request
//! timeout, and bounded retries. The retry policy is deliberately narrow:
//!
//! - request timeout or 5xx → retry with backoff, up to `max_retries`
//!   attempts total;
//! - 4xx, connection failure, or malformed JSON → abort immediately;
//! - retries exhausted → `None`.
//!
//! Callers (the remote tokenizer/reranker/chunker wrappers) treat `None`
//! and every error identically: they substitute the local fallback. The
//! per-call state machine is `Idle → Requesting → {Success, Retrying,
//! Falling Back}`; nothing persists across calls beyond the connection
//! pool inside the client.

use anyhow::{bail, Result};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Maximum simultaneous outstanding requests for batch operations.
pub const MAX_CONCURRENT_REQUESTS: usize = 10;

/// Shared HTTP client for remote backend calls.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
    client: reqwest::Client,
}

impl RemoteClient {
    /// Build a client for `base_url` with the given timeout and retry bound.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// One POST attempt. Errors on transport failure, non-2xx status, or
    /// a body that is not valid JSON.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("remote backend error {status}: {body_text}");
        }

        Ok(response.json().await?)
    }

    /// POST with the bounded-retry policy.
    ///
    /// Returns `Some(json)` on success, `None` when the call should be
    /// abandoned in favor of the local fallback — whether because retries
    /// were exhausted or because a non-retryable failure occurred.
    pub async fn post_with_retry(&self, path: &str, body: &Value) -> Option<Value> {
        for attempt in 0..self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            let mut req = self.client.post(self.url(path)).json(body);
            if let Some(key) = &self.api_key {
                req = req.header("Authorization", format!("Bearer {key}"));
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.json::<Value>().await {
                            Ok(json) => return Some(json),
                            // Malformed body: not retryable.
                            Err(_) => return None,
                        }
                    }
                    if status.is_server_error() {
                        continue;
                    }
                    // 4xx: the request itself is wrong, retrying cannot help.
                    return None;
                }
                Err(e) if e.is_timeout() => continue,
                Err(_) => return None,
            }
        }

        None
    }
}

/// Delay before retry `attempt` (1-based): 200ms, 400ms, 800ms, 1600ms,
/// capped at 2s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis((200u64 << (attempt - 1).min(4)).min(2_000))
}

/// Run a future to completion from a blocking call site.
///
/// Builds a throwaway current-thread runtime. Callers must check
/// [`inside_runtime`] first: the blocking entry points short-circuit to
/// their local fallback when already inside tokio rather than nesting
/// runtimes.
pub fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

/// True when the current thread is running inside a tokio runtime.
pub fn inside_runtime() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}
