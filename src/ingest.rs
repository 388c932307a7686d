//! `gitsage ingest`: index one repository.
//!
//! The target is either a local directory or a remote git URL. Remote
//! repositories are cloned into `[sources].cache_dir` and versioned by
//! their HEAD commit; local directories are versioned by a digest of their
//! file listing unless `--version` pins one. Re-ingesting an unchanged
//! version is a no-op.

use anyhow::Result;
use std::path::Path;

use gitsage_core::ingest::{IngestReport, IngestStatus};

use crate::app::{resolve_repo, App};
use crate::source::{is_remote, GitSource, LocalSource};

pub async fn run_ingest(
    app: &App,
    target: &str,
    repo: Option<&str>,
    version: Option<String>,
) -> Result<()> {
    let repo_id = match repo {
        Some(r) => resolve_repo(r)?,
        None => resolve_repo(target)?,
    };
    let pipeline = app.pipeline();

    let report = if is_remote(target) {
        if version.is_some() {
            tracing::warn!("--version is ignored for git sources; the HEAD commit is used");
        }
        let url = target.to_string();
        let sources = app.config.sources.clone();
        let source = tokio::task::spawn_blocking(move || GitSource::fetch(&url, &sources)).await??;
        pipeline.ingest(&repo_id, &source).await?
    } else {
        let source = LocalSource::new(Path::new(target), &app.config.sources)?.with_version(version);
        pipeline.ingest(&repo_id, &source).await?
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &IngestReport) {
    println!("ingest {}", report.repo);
    println!(
        "  version: {}",
        report.content_version.as_deref().unwrap_or("(unversioned)")
    );
    match report.status {
        IngestStatus::Skipped => println!("  already ingested; nothing to do"),
        IngestStatus::InProgress => println!("  another ingestion of this version is in progress"),
        IngestStatus::Ingested => {
            println!("  files seen: {}", report.files_seen);
            println!("  files accepted: {}", report.files_accepted);
            println!("  files rejected: {}", report.files_rejected);
            println!(
                "  chunks written: {} ({} code, {} text)",
                report.chunk_count, report.code_chunks, report.text_chunks
            );
        }
    }
    println!("{}", report.status);
}
