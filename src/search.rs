//! `gitsage search`: raw retrieval, merged across both embedding spaces.

use anyhow::Result;

use gitsage_core::models::RepoId;

use crate::app::App;

pub async fn run_search(
    app: &App,
    query: &str,
    repo: Option<&RepoId>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let top_k = limit.unwrap_or(app.config.retrieval.top_k);
    let results = app.retriever().retrieve(query, top_k, repo).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let label = if result.metadata.summary {
            "(repository summary)".to_string()
        } else {
            result.metadata.path.clone()
        };
        println!(
            "{}. [{:.2}] {} ({}, {})",
            i + 1,
            result.similarity,
            label,
            result.metadata.language,
            result.metadata.kind
        );
        println!("    repo: {}", result.metadata.repo);
        println!("    excerpt: \"{}\"", excerpt(&result.content, 160));
        println!();
    }

    Ok(())
}

/// First `max_chars` characters of `content` on one line.
fn excerpt(content: &str, max_chars: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
