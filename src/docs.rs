//! `gitsage docs`: generate Markdown documentation for one repository.

use anyhow::{Context, Result};
use std::path::Path;

use gitsage_core::models::RepoId;

use crate::app::App;

pub async fn run_docs(app: &App, repo: &RepoId, output: Option<&Path>) -> Result<()> {
    let docs = app.docs()?.generate(repo).await?;
    let markdown = docs.to_markdown();

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &markdown)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "Wrote {} sections for {} to {}",
                docs.sections.len(),
                repo,
                path.display()
            );
        }
        None => print!("{}", markdown),
    }
    Ok(())
}
