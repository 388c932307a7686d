//! Schema creation. Every statement is idempotent, so `gitsage init` can be
//! run any number of times against the same database.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Code and text collections share one layout.
    for table in ["code_chunks", "text_chunks"] {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                repo_id TEXT NOT NULL,
                path TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                language TEXT NOT NULL,
                kind TEXT NOT NULL,
                summary INTEGER NOT NULL DEFAULT 0,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#
        ))
        .execute(pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_repo ON {table}(repo_id)"
        ))
        .execute(pool)
        .await?;
    }

    // Ingestion ledger: append-only, one row per (repository, version)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingestions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            repo_id TEXT NOT NULL,
            content_version TEXT NOT NULL,
            ingested_at INTEGER NOT NULL,
            UNIQUE(repo_id, content_version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // In-progress claims; the primary key makes claiming atomic
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingestion_claims (
            repo_id TEXT NOT NULL,
            content_version TEXT NOT NULL,
            claimed_at INTEGER NOT NULL,
            PRIMARY KEY (repo_id, content_version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
