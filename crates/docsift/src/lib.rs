//! # docsift
//!
//! Turns raw long-form documentation text into a ranked set of
//! token-bounded excerpts relevant to a query. Sits between a document
//! retrieval source and a consumer (an agent or search UI) that needs
//! compact context within a token budget.
//!
//! ## Pipeline
//!
//! ```text
//! raw text ──▶ Chunker (Tokenizer) ──▶ chunks ──▶ Reranker ──▶ top-K
//! ```
//!
//! Every capability (tokenizer, chunker, reranker, query parser) is a
//! trait with one local, deterministic implementation and an optional
//! remote HTTP backend. Remote backends retry transient failures and
//! then silently fall back to the local implementation — a remote
//! failure is never surfaced to the caller as an error.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML + environment configuration |
//! | [`remote`] | HTTP gateway with bounded retries |
//! | [`tokenizer_remote`] | Remote token counting with local fallback |
//! | [`reranker_remote`] | Remote reranking with TF-IDF fallback |
//! | [`chunker_remote`] | Remote embedding-based chunking with structural fallback |
//! | [`query`] | Library/topic query parsing |
//! | [`registry`] | Backend factory and process-wide defaults |
//! | [`format`] | Markdown output formatting |

pub mod chunker_remote;
pub mod config;
pub mod format;
pub mod query;
pub mod registry;
pub mod remote;
pub mod reranker_remote;
#[cfg(feature = "tiktoken")]
pub mod tiktoken;
pub mod tokenizer_remote;

pub use docsift_core::chunk::{Chunker, RegexChunker};
pub use docsift_core::models::DocChunk;
pub use docsift_core::rank::{Reranker, TfidfReranker};
pub use docsift_core::tokenize::{ApproxTokenizer, Tokenizer};
