//! Backend construction and process-wide defaults.
//!
//! The `create_*` functions build a backend from configuration,
//! preferring remote implementations when an endpoint is configured and
//! always degrading to the local ones when construction fails. The
//! [`Backends`] bundle groups one of each so a pipeline can be passed
//! around as a unit; a process-wide default bundle is kept behind a
//! lock for callers that want ambient configuration.

use std::sync::{Arc, OnceLock, RwLock};

use docsift_core::chunk::{Chunker, RegexChunker};
use docsift_core::rank::{Reranker, TfidfReranker};
use docsift_core::tokenize::Tokenizer;

use crate::chunker_remote::HttpSemanticChunker;
use crate::config::{ChunkerConfig, Config, LlmConfig, RerankerConfig, TokenizerConfig};
use crate::query::{LlmQueryParser, QueryParser, SimpleQueryParser};
use crate::reranker_remote::HttpReranker;
use crate::tokenizer_remote::HttpTokenizer;

/// Best local tokenizer available: exact BPE counts when the `tiktoken`
/// feature is on, the word/punctuation approximation otherwise.
pub fn local_tokenizer() -> Arc<dyn Tokenizer> {
    #[cfg(feature = "tiktoken")]
    {
        if let Ok(tokenizer) = crate::tiktoken::TiktokenTokenizer::new() {
            return Arc::new(tokenizer);
        }
    }
    Arc::new(docsift_core::tokenize::ApproxTokenizer)
}

pub fn create_tokenizer(config: &TokenizerConfig) -> Arc<dyn Tokenizer> {
    let fallback = local_tokenizer();
    if config.endpoint.is_some() {
        if let Ok(tokenizer) = HttpTokenizer::new(config.clone(), Arc::clone(&fallback)) {
            return Arc::new(tokenizer);
        }
    }
    fallback
}

pub fn create_reranker(config: &RerankerConfig) -> Arc<dyn Reranker> {
    if config.endpoint.is_some() {
        if let Ok(reranker) = HttpReranker::new(config.clone(), Arc::new(TfidfReranker::new())) {
            return Arc::new(reranker);
        }
    }
    Arc::new(TfidfReranker::new())
}

pub fn create_chunker(config: &ChunkerConfig, tokenizer: Arc<dyn Tokenizer>) -> Arc<dyn Chunker> {
    if config.mode == "semantic" && config.endpoint.is_some() {
        if let Ok(chunker) = HttpSemanticChunker::new(config.clone(), Arc::clone(&tokenizer)) {
            return Arc::new(chunker);
        }
    }
    Arc::new(RegexChunker::new(tokenizer))
}

pub fn create_query_parser(config: &LlmConfig) -> Arc<dyn QueryParser> {
    if config.endpoint.is_some() && config.api_key.is_some() {
        if let Ok(parser) = LlmQueryParser::new(config.clone()) {
            return Arc::new(parser);
        }
    }
    Arc::new(SimpleQueryParser::new())
}

/// One of each backend, built from a single [`Config`].
#[derive(Clone)]
pub struct Backends {
    pub tokenizer: Arc<dyn Tokenizer>,
    pub chunker: Arc<dyn Chunker>,
    pub reranker: Arc<dyn Reranker>,
    pub query_parser: Arc<dyn QueryParser>,
}

impl Backends {
    pub fn from_config(config: &Config) -> Self {
        let tokenizer = create_tokenizer(&config.tokenizer);
        Self {
            chunker: create_chunker(&config.chunker, Arc::clone(&tokenizer)),
            reranker: create_reranker(&config.reranker),
            query_parser: create_query_parser(&config.llm),
            tokenizer,
        }
    }

    /// All-local bundle, ignoring any endpoint configuration.
    pub fn local() -> Self {
        let tokenizer = local_tokenizer();
        Self {
            chunker: Arc::new(RegexChunker::new(Arc::clone(&tokenizer))),
            reranker: Arc::new(TfidfReranker::new()),
            query_parser: Arc::new(SimpleQueryParser::new()),
            tokenizer,
        }
    }
}

fn default_slot() -> &'static RwLock<Option<Arc<Backends>>> {
    static DEFAULTS: OnceLock<RwLock<Option<Arc<Backends>>>> = OnceLock::new();
    DEFAULTS.get_or_init(|| RwLock::new(None))
}

/// Process-wide default backends, built lazily from the environment.
pub fn default_backends() -> Arc<Backends> {
    if let Ok(guard) = default_slot().read() {
        if let Some(backends) = guard.as_ref() {
            return Arc::clone(backends);
        }
    }
    let backends = Arc::new(Backends::from_config(&Config::from_env()));
    set_default_backends(Arc::clone(&backends));
    backends
}

pub fn set_default_backends(backends: Arc<Backends>) {
    if let Ok(mut guard) = default_slot().write() {
        *guard = Some(backends);
    }
}

/// Rebuild the defaults from environment variables.
pub fn configure_from_env() {
    set_default_backends(Arc::new(Backends::from_config(&Config::from_env())));
}

/// Reset the defaults to local implementations.
pub fn reset_defaults() {
    set_default_backends(Arc::new(Backends::local()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_endpoint_builds_local_backends() {
        let config = Config::default();
        let backends = Backends::from_config(&config);
        let chunks = backends.chunker.split("one two three.", "doc", 100);
        assert_eq!(chunks.len(), 1);
        let ranked = backends.reranker.rerank(&chunks, "two", 5);
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].score > 0.0);
    }

    #[test]
    fn test_endpoint_selects_remote_reranker() {
        let config = RerankerConfig {
            endpoint: Some("http://127.0.0.1:9".to_string()),
            ..RerankerConfig::default()
        };
        // Construction succeeds; failures surface as fallback at call time.
        let reranker = create_reranker(&config);
        let chunks = vec![docsift_core::models::DocChunk::new("alpha beta", "s", 2)];
        let ranked = reranker.rerank(&chunks, "alpha", 1);
        assert_eq!(ranked.len(), 1);
    }

    #[test]
    fn test_semantic_mode_without_endpoint_is_regex() {
        let config = ChunkerConfig {
            mode: "semantic".to_string(),
            ..ChunkerConfig::default()
        };
        let chunker = create_chunker(&config, local_tokenizer());
        let chunks = chunker.split("# A\n\nbody text here.", "doc", 100);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_query_parser_requires_key_and_endpoint() {
        let config = LlmConfig {
            endpoint: Some("http://127.0.0.1:9".to_string()),
            api_key: None,
            ..LlmConfig::default()
        };
        let parser = create_query_parser(&config);
        let parsed = parser.parse("react hooks");
        assert_eq!(parsed.library_name, "react");
    }

    #[test]
    fn test_reset_defaults_is_local() {
        reset_defaults();
        let backends = default_backends();
        let chunks = backends.chunker.split("plain text here.", "doc", 100);
        assert_eq!(chunks.len(), 1);
    }
}
