//! Query parsing: turning a natural-language question into a library
//! name and topic.
//!
//! [`SimpleQueryParser`] is rule-based and always available: it matches
//! a table of well-known library aliases, then falls back through
//! quoted terms, capitalized words, and finally the first word, with a
//! confidence score that drops at each tier. [`LlmQueryParser`] asks an
//! OpenAI-compatible chat endpoint for a structured answer and falls
//! back to the rule-based parser on any failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::LlmConfig;
use crate::remote::{block_on, inside_runtime, RemoteClient};

/// Structured output from query parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    /// Canonical library or package name (e.g. `react`, `fastapi`).
    pub library_name: String,
    /// Focus area within the library, if the query names one.
    #[serde(default)]
    pub topic: Option<String>,
    /// Version constraint if specified (e.g. `v18`, `>=2.0`).
    #[serde(default)]
    pub version: Option<String>,
    /// Parser confidence in `[0, 1]`.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Other libraries that might match if the primary is wrong.
    #[serde(default)]
    pub alternative_libraries: Vec<String>,
    /// The query as the user typed it.
    #[serde(default)]
    pub raw_query: String,
}

fn default_confidence() -> f64 {
    0.5
}

#[async_trait]
pub trait QueryParser: Send + Sync {
    fn parse(&self, query: &str) -> ParsedQuery;

    async fn parse_async(&self, query: &str) -> ParsedQuery {
        self.parse(query)
    }
}

/// Canonical name plus the aliases users actually type.
const LIBRARY_PATTERNS: &[(&str, &[&str])] = &[
    // JavaScript/TypeScript
    ("react", &["react", "reactjs", "react.js"]),
    ("next.js", &["next", "nextjs", "next.js"]),
    ("vue", &["vue", "vuejs", "vue.js"]),
    ("angular", &["angular", "angularjs"]),
    ("svelte", &["svelte", "sveltekit"]),
    ("express", &["express", "expressjs"]),
    ("fastify", &["fastify"]),
    ("nest", &["nest", "nestjs"]),
    // Python
    ("fastapi", &["fastapi", "fast api", "fast-api"]),
    ("django", &["django"]),
    ("flask", &["flask"]),
    ("pandas", &["pandas"]),
    ("numpy", &["numpy"]),
    ("tensorflow", &["tensorflow", "tf"]),
    ("pytorch", &["pytorch", "torch"]),
    ("scikit-learn", &["sklearn", "scikit-learn", "scikit learn"]),
    // Go
    ("gin", &["gin", "gin-gonic"]),
    ("echo", &["echo", "labstack echo"]),
    ("fiber", &["fiber", "gofiber"]),
    // Rust
    ("actix", &["actix", "actix-web"]),
    ("tokio", &["tokio"]),
    ("axum", &["axum"]),
    // Other
    ("docker", &["docker", "dockerfile"]),
    ("kubernetes", &["kubernetes", "k8s", "kubectl"]),
    ("terraform", &["terraform", "tf"]),
];

/// Rule-based parser. Always succeeds; the confidence score reflects
/// which heuristic tier produced the answer (0.7 alias table, 0.6
/// quoted term, 0.4 capitalized word, 0.2 first word).
#[derive(Debug, Default, Clone)]
pub struct SimpleQueryParser;

impl SimpleQueryParser {
    pub fn new() -> Self {
        Self
    }

    fn match_alias(query_lower: &str) -> Option<&'static str> {
        for (canonical, patterns) in LIBRARY_PATTERNS {
            if patterns.iter().any(|p| query_lower.contains(p)) {
                return Some(canonical);
            }
        }
        None
    }

    /// First term inside single or double quotes.
    fn first_quoted(query: &str) -> Option<String> {
        for quote in ['"', '\''] {
            let mut parts = query.splitn(3, quote);
            let _ = parts.next()?;
            if let (Some(inner), Some(_)) = (parts.next(), parts.next()) {
                if !inner.is_empty() {
                    return Some(inner.to_lowercase());
                }
            }
        }
        None
    }

    /// First capitalized word, keeping a dotted suffix like `Next.js`.
    fn first_capitalized(query: &str) -> Option<String> {
        for word in query.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '.');
            let mut chars = word.chars();
            match chars.next() {
                Some(first) if first.is_ascii_uppercase() => {
                    if chars.all(|c| c.is_ascii_alphanumeric() || c == '.') {
                        return Some(word.trim_end_matches('.').to_lowercase());
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// Words after the library name, with leading connectives stripped.
    fn extract_topic(query: &str, library_name: &str) -> Option<String> {
        let query_lower = query.to_lowercase();
        let stem = library_name.split('.').next().unwrap_or(library_name);
        let idx = query_lower.find(stem)?;

        let start = idx + library_name.len();
        let mut remainder = query.get(start..).unwrap_or("").trim();
        for prefix in ["for", "with", "in", "about", "-", ":"] {
            if remainder.to_lowercase().starts_with(prefix) {
                remainder = remainder[prefix.len()..].trim();
            }
        }

        if remainder.len() > 2 {
            let end = remainder
                .char_indices()
                .nth(100)
                .map_or(remainder.len(), |(i, _)| i);
            Some(remainder[..end].to_string())
        } else {
            None
        }
    }
}

#[async_trait]
impl QueryParser for SimpleQueryParser {
    fn parse(&self, query: &str) -> ParsedQuery {
        let query_lower = query.to_lowercase();

        let (library_name, confidence) = if let Some(name) = Self::match_alias(&query_lower) {
            (name.to_string(), 0.7)
        } else if let Some(name) = Self::first_quoted(query) {
            (name, 0.6)
        } else if let Some(name) = Self::first_capitalized(query) {
            (name, 0.4)
        } else if let Some(word) = query.split_whitespace().next() {
            (word.to_lowercase(), 0.2)
        } else {
            ("unknown".to_string(), 0.2)
        };

        let topic = Self::extract_topic(query, &library_name);

        ParsedQuery {
            library_name,
            topic,
            version: None,
            confidence,
            alternative_libraries: Vec::new(),
            raw_query: query.to_string(),
        }
    }
}

const QUERY_PARSER_SYSTEM_PROMPT: &str = "\
You are a library documentation query parser. Your task is to analyze user \
queries about programming libraries and extract structured information.

Given a user query, identify:
1. **library_name**: The primary library, package, or framework being asked \
about. Use the canonical/official name (e.g., \"react\" not \"React.js\").
2. **topic**: The specific topic, feature, or concept within that library. \
Leave null if the query is general.
3. **version**: Any version constraints mentioned. Leave null if not specified.
4. **confidence**: Your confidence in the parsing from 0.0 to 1.0.
5. **alternative_libraries**: Other libraries that might match (max 3).

Respond ONLY with valid JSON matching the schema. No explanation.";

/// Parser backed by an OpenAI-compatible chat-completions endpoint.
///
/// Requires both an endpoint and an API key; anything short of a
/// well-formed structured answer degrades to [`SimpleQueryParser`].
#[derive(Clone)]
pub struct LlmQueryParser {
    config: LlmConfig,
    fallback: SimpleQueryParser,
    client: RemoteClient,
}

impl LlmQueryParser {
    pub fn new(config: LlmConfig) -> anyhow::Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("LLM endpoint not configured"))?;
        let client = RemoteClient::new(
            &endpoint,
            config.api_key.clone(),
            std::time::Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self {
            config,
            fallback: SimpleQueryParser::new(),
            client,
        })
    }

    fn build_request(&self, query: &str) -> Value {
        json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": QUERY_PARSER_SYSTEM_PROMPT},
                {"role": "user", "content": query},
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "response_format": {"type": "json_object"},
        })
    }

    fn parse_response(&self, response: &Value, query: &str) -> ParsedQuery {
        let content = response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str);

        let parsed = content.and_then(|c| serde_json::from_str::<ParsedQuery>(c).ok());
        match parsed {
            Some(mut p) => {
                p.raw_query = query.to_string();
                p
            }
            None => self.fallback.parse(query),
        }
    }
}

#[async_trait]
impl QueryParser for LlmQueryParser {
    fn parse(&self, query: &str) -> ParsedQuery {
        if inside_runtime() {
            return self.fallback.parse(query);
        }
        match block_on(self.parse_async(query)) {
            Ok(parsed) => parsed,
            Err(_) => self.fallback.parse(query),
        }
    }

    async fn parse_async(&self, query: &str) -> ParsedQuery {
        if self.config.endpoint.is_none() || self.config.api_key.is_none() {
            return self.fallback.parse(query);
        }

        let request = self.build_request(query);
        match self.client.post_json("chat/completions", &request).await {
            Ok(response) => self.parse_response(&response, query),
            Err(_) => self.fallback.parse(query),
        }
    }
}
