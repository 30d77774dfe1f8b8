//! Markdown rendering of ranked results.

use docsift_core::models::DocChunk;

/// Render ranked chunks as a markdown report.
pub fn format_output(chunks: &[DocChunk], query: &str) -> String {
    let mut output = Vec::new();
    output.push(format!("# Top {} Results for: {}\n", chunks.len(), query));

    let total_tokens: usize = chunks.iter().map(|c| c.tokens).sum();
    output.push(format!("_Total tokens: {}_\n", total_tokens));

    for (i, chunk) in chunks.iter().enumerate() {
        output.push(format!(
            "\n## Result {} (score: {:.3}, tokens: {})",
            i + 1,
            chunk.score,
            chunk.tokens
        ));
        if !chunk.source.is_empty() {
            output.push(format!("_Source: {}_", chunk.source));
        }
        output.push(String::new());
        output.push(chunk.content.clone());
    }

    output.join("\n")
}
