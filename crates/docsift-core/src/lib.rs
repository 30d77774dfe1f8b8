//! # docsift core
//!
//! Shared, runtime-free logic for docsift: the chunk model, token
//! counting, hierarchical segmentation, and TF-IDF reranking.
//!
//! This crate contains no tokio, HTTP, filesystem I/O, or other
//! native-only dependencies. Every function here is a total computation
//! over in-memory data: segmentation and ranking cannot fail, and they
//! are safe to call concurrently on independent inputs.
//!
//! The capability traits ([`Tokenizer`](tokenize::Tokenizer),
//! [`Chunker`](chunk::Chunker), [`Reranker`](rank::Reranker)) are
//! defined here next to their local implementations; the remote HTTP
//! backends live in the `docsift` app crate.

pub mod chunk;
pub mod models;
pub mod rank;
pub mod tokenize;
