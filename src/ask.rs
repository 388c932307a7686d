//! `gitsage ask`: answer a question about one ingested repository.

use anyhow::Result;

use gitsage_core::models::RepoId;
use gitsage_core::qa::QuestionMode;

use crate::app::App;

pub async fn run_ask(
    app: &App,
    repo: &RepoId,
    question: &str,
    version: Option<&str>,
    json: bool,
) -> Result<()> {
    let answer = app.qa()?.answer(repo, question, version).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
        return Ok(());
    }

    let mode = match answer.mode {
        QuestionMode::Inventory => "inventory",
        QuestionMode::Structure => "structure",
        QuestionMode::Explanation => "explanation",
    };
    println!("{}", answer.text);
    println!();
    println!("  mode: {}", mode);
    if !answer.sources.is_empty() {
        println!("  sources:");
        for s in &answer.sources {
            println!("    - {}", s);
        }
    }
    Ok(())
}
