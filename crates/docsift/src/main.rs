//! # Docsift CLI (`sift`)
//!
//! Chunk documentation, score chunks against a query, and print the top
//! results. Remote backends (tokenizer, reranker, semantic chunker) are
//! picked up from the config file or environment variables and degrade
//! to the local implementations when unreachable.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sift resolve <name>` | Build a resolve-library-id tool request |
//! | `sift docs <id>` | Build a get-library-docs tool request |
//! | `sift process -q <query>` | Chunk and rerank content from a file or stdin |
//!
//! ## Examples
//!
//! ```bash
//! # Rerank a local markdown file against a query
//! sift process -q "connection pooling" -i docs/db.md -k 3
//!
//! # Same, reading from stdin with a smaller chunk budget
//! cat docs/db.md | sift process -q "connection pooling" -c 500
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;

use docsift::config::{load_config, Config};
use docsift::format::format_output;
use docsift::registry::Backends;

/// Docsift CLI — chunking and relevance scoring for library documentation.
#[derive(Parser)]
#[command(
    name = "sift",
    about = "Chunk documentation and rerank it against a query",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Environment variables are used
    /// when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a resolve-library-id tool request for a library name.
    ///
    /// Prints the request as JSON; it does not execute the call.
    Resolve {
        /// Library name to resolve (e.g. `react`, `fastapi`).
        library_name: String,
    },

    /// Build a get-library-docs tool request for a library ID.
    ///
    /// Prints the request as JSON; it does not execute the call.
    Docs {
        /// Library ID to fetch documentation for.
        library_id: String,

        /// Topic to focus the documentation on.
        #[arg(long, short)]
        topic: Option<String>,

        /// Maximum tokens of documentation to retrieve.
        #[arg(long, short = 'n', default_value_t = 10_000)]
        tokens: usize,

        /// Number of top results to keep when reranking the fetched docs.
        #[arg(long = "top", short = 'k', default_value_t = 5)]
        top: usize,

        /// Query for reranking. Defaults to the topic.
        #[arg(long, short)]
        query: Option<String>,
    },

    /// Chunk raw content and rerank it against a query.
    Process {
        /// Query to score chunks against.
        #[arg(long, short)]
        query: String,

        /// Number of top results to keep.
        #[arg(long = "top", short = 'k', default_value_t = 5)]
        top: usize,

        /// Input file. Reads stdin when omitted.
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Maximum tokens per chunk.
        #[arg(long = "max-chunk-tokens", short = 'c', default_value_t = 1000)]
        max_chunk_tokens: usize,
    },
}

/// Tool request for resolving a library name to an ID.
fn build_resolve_request(library_name: &str) -> serde_json::Value {
    json!({
        "tool": "resolve-library-id",
        "input": {"libraryName": library_name},
        "instruction": format!(
            "Call resolve-library-id with libraryName='{}' to get the library ID",
            library_name
        ),
    })
}

/// Tool request for fetching documentation for a library ID.
fn build_docs_request(library_id: &str, topic: Option<&str>, tokens: usize) -> serde_json::Value {
    let mut input = json!({"libraryID": library_id, "tokens": tokens});
    let mut instruction = format!("Call get-library-docs for '{}'", library_id);
    if let Some(topic) = topic {
        input["topic"] = json!(topic);
        instruction.push_str(&format!(" with topic='{}'", topic));
    }
    json!({
        "tool": "get-library-docs",
        "input": input,
        "instruction": instruction,
    })
}

fn read_content(input: Option<&PathBuf>) -> anyhow::Result<String> {
    match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display())),
        None => {
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read stdin")?;
            Ok(content)
        }
    }
}

// Deliberately synchronous: remote backends spin up their own runtime
// per call, and a sync entry point is what keeps them usable at all.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::from_env(),
    };
    let backends = Backends::from_config(&config);

    match cli.command {
        Commands::Resolve { library_name } => {
            let request = build_resolve_request(&library_name);
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
        Commands::Docs {
            library_id,
            topic,
            tokens,
            ..
        } => {
            let request = build_docs_request(&library_id, topic.as_deref(), tokens);
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
        Commands::Process {
            query,
            top,
            input,
            max_chunk_tokens,
        } => {
            let content = read_content(input.as_ref())?;
            let chunks = backends.chunker.split(&content, "input", max_chunk_tokens);
            let ranked = backends.reranker.rerank(&chunks, &query, top);
            println!("{}", format_output(&ranked, &query));
        }
    }

    Ok(())
}
