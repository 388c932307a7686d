//! Database statistics and health overview.
//!
//! Provides a quick summary of what's indexed: chunk counts per collection
//! and a per-repository breakdown with the latest ingested version. Used by
//! `gitsage stats` to confirm that ingestion worked as expected.

use anyhow::Result;
use std::collections::BTreeMap;

use gitsage_core::models::{ChunkKind, IngestionRecord};

use crate::app::App;

pub async fn run_stats(app: &App) -> Result<()> {
    let store = app.store();

    let code_total = store.count(ChunkKind::Code, None).await?;
    let text_total = store.count(ChunkKind::Text, None).await?;
    let ingestions = store.ingestions().await?;

    let db_size = std::fs::metadata(&app.config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("GitSage — Database Stats");
    println!("========================");
    println!();
    println!("  Database:    {}", app.config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Code chunks: {}", code_total);
    println!("  Text chunks: {}", text_total);
    println!("  Ingestions:  {}", ingestions.len());

    // Latest record per repository; ingestions() is oldest first.
    let mut latest: BTreeMap<String, &IngestionRecord> = BTreeMap::new();
    for record in &ingestions {
        latest.insert(record.repo.to_string(), record);
    }

    if !latest.is_empty() {
        println!();
        println!("  By repository:");
        println!(
            "  {:<40} {:>6} {:>6}   {:<16} {}",
            "REPOSITORY", "CODE", "TEXT", "VERSION", "INGESTED"
        );
        println!("  {}", "-".repeat(96));

        for record in latest.values() {
            let code = store.count(ChunkKind::Code, Some(&record.repo)).await?;
            let text = store.count(ChunkKind::Text, Some(&record.repo)).await?;
            println!(
                "  {:<40} {:>6} {:>6}   {:<16} {}",
                record.repo.as_str(),
                code,
                text,
                short_version(&record.content_version),
                format_ts_relative(record.ingested_at.timestamp())
            );
        }
    }

    println!();
    Ok(())
}

fn short_version(version: &str) -> String {
    version.chars().take(16).collect()
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
