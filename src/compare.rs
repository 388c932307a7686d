//! `gitsage compare`: side-by-side comparison of two ingested repositories.

use anyhow::Result;

use gitsage_core::compare::{Comparison, SideBySide};
use gitsage_core::models::RepoId;

use crate::app::App;

pub async fn run_compare(app: &App, repo_a: &RepoId, repo_b: &RepoId, json: bool) -> Result<()> {
    let comparison = app.comparison()?.compare(repo_a, repo_b).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
    } else {
        print_comparison(&comparison);
    }
    Ok(())
}

fn print_comparison(c: &Comparison) {
    println!("Repository Comparison");
    println!("=====================");
    println!();
    println!("  A: {}", c.repo_a);
    println!("  B: {}", c.repo_b);
    println!();

    println!("  {:<28} {:>8} {:>8}", "FEATURE", "A", "B");
    println!("  {}", "-".repeat(46));
    for row in &c.features {
        println!(
            "  {:<28} {:>8} {:>8}",
            row.feature,
            row.repo_a.to_string(),
            row.repo_b.to_string()
        );
    }

    let v = &c.verdict;
    print_list("Overview", &v.overview);
    print_list("Architecture", &v.architecture);
    print_pair("Strengths", &v.strengths);
    print_list("Trade-offs", &v.tradeoffs);
    print_pair("Ideal use cases", &v.ideal_use_cases);
    print_list("Verdict", &v.verdict);
    println!();
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!();
    println!("  {}:", title);
    for item in items {
        println!("    - {}", item);
    }
}

fn print_pair(title: &str, pair: &SideBySide) {
    if pair.repo_a.is_empty() && pair.repo_b.is_empty() {
        return;
    }
    println!();
    println!("  {}:", title);
    for (side, items) in [("A", &pair.repo_a), ("B", &pair.repo_b)] {
        for item in items {
            println!("    {} - {}", side, item);
        }
    }
}
