//! SQLite-backed [`VectorStore`] implementation.
//!
//! Each collection is its own table (`code_chunks`, `text_chunks`) with the
//! vector stored as a little-endian f32 BLOB. Queries load the candidate
//! rows for the requested repository and rank them by brute-force cosine
//! similarity, which is fine at single-repository scale.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use gitsage_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use gitsage_core::models::{
    ChunkKind, ChunkMetadata, EmbeddedChunk, IngestionRecord, Language, RepoId,
};
use gitsage_core::store::{ensure_kind, Neighbor, VectorStore};

/// SQLite implementation of the [`VectorStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn table(kind: ChunkKind) -> &'static str {
    match kind {
        ChunkKind::Code => "code_chunks",
        ChunkKind::Text => "text_chunks",
    }
}

fn row_to_neighbor(row: &SqliteRow, query: &[f32]) -> Result<Neighbor> {
    let repo: String = row.get("repo_id");
    let kind: String = row.get("kind");
    let language: String = row.get("language");
    let summary: i64 = row.get("summary");
    let blob: Vec<u8> = row.get("embedding");

    let vector = blob_to_vec(&blob);
    let score = cosine_similarity(query, &vector) as f64;

    Ok(Neighbor {
        id: row.get("id"),
        content: row.get("content"),
        metadata: ChunkMetadata {
            repo: RepoId::parse(&repo)?,
            path: row.get("path"),
            language: Language::parse(&language),
            kind: ChunkKind::parse(&kind)
                .ok_or_else(|| anyhow!("Unknown chunk kind in store: {}", kind))?,
            summary: summary != 0,
        },
        vector: Some(vector),
        score,
    })
}

async fn insert_records(
    conn: &mut SqliteConnection,
    kind: ChunkKind,
    records: &[EmbeddedChunk],
) -> Result<()> {
    let sql = format!(
        r#"
        INSERT OR REPLACE INTO {} (id, repo_id, path, chunk_index, language, kind,
                                   summary, content, embedding)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        table(kind)
    );

    for r in records {
        let meta = r.chunk.metadata();
        sqlx::query(&sql)
            .bind(&r.chunk.id)
            .bind(meta.repo.as_str())
            .bind(&meta.path)
            .bind(r.chunk.index as i64)
            .bind(meta.language.as_str())
            .bind(meta.kind.as_str())
            .bind(meta.summary as i64)
            .bind(&r.chunk.content)
            .bind(vec_to_blob(&r.vector))
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn delete_repository(conn: &mut SqliteConnection, repo: &RepoId) -> Result<u64> {
    let mut removed = 0;
    for kind in ChunkKind::ALL {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE repo_id = ?", table(kind)))
            .bind(repo.as_str())
            .execute(&mut *conn)
            .await?;
        removed += result.rows_affected();
    }
    Ok(removed)
}

fn row_to_record(row: &SqliteRow) -> Result<IngestionRecord> {
    let repo: String = row.get("repo_id");
    let ts: i64 = row.get("ingested_at");
    Ok(IngestionRecord {
        repo: RepoId::parse(&repo)?,
        content_version: row.get("content_version"),
        ingested_at: DateTime::from_timestamp_millis(ts).unwrap_or_else(Utc::now),
    })
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn add(&self, kind: ChunkKind, records: &[EmbeddedChunk]) -> Result<()> {
        ensure_kind(kind, records)?;

        let mut tx = self.pool.begin().await?;
        insert_records(&mut tx, kind, records).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        kind: ChunkKind,
        vector: &[f32],
        top_k: usize,
        repo: Option<&RepoId>,
    ) -> Result<Vec<Neighbor>> {
        let columns = "id, repo_id, path, language, kind, summary, content, embedding";
        let rows = match repo {
            Some(r) => {
                sqlx::query(&format!(
                    "SELECT {} FROM {} WHERE repo_id = ?",
                    columns,
                    table(kind)
                ))
                .bind(r.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("SELECT {} FROM {}", columns, table(kind)))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut neighbors = rows
            .iter()
            .map(|row| row_to_neighbor(row, vector))
            .collect::<Result<Vec<_>>>()?;

        neighbors.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        neighbors.truncate(top_k);
        Ok(neighbors)
    }

    async fn is_ingested(&self, repo: &RepoId, version: &str) -> Result<bool> {
        let found: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM ingestions WHERE repo_id = ? AND content_version = ?",
        )
        .bind(repo.as_str())
        .bind(version)
        .fetch_one(&self.pool)
        .await?;
        Ok(found > 0)
    }

    async fn mark_ingested(&self, repo: &RepoId, version: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO ingestions (repo_id, content_version, ingested_at) VALUES (?, ?, ?)",
        )
        .bind(repo.as_str())
        .bind(version)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_ingestion(&self, repo: &RepoId, version: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now().timestamp_millis();
        let stale_before = now.saturating_sub(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));

        // A fresh row or a takeover of an expired claim both count as one change.
        let result = sqlx::query(
            r#"
            INSERT INTO ingestion_claims (repo_id, content_version, claimed_at)
            VALUES (?, ?, ?)
            ON CONFLICT(repo_id, content_version) DO UPDATE
                SET claimed_at = excluded.claimed_at
                WHERE ingestion_claims.claimed_at < ?
            "#,
        )
        .bind(repo.as_str())
        .bind(version)
        .bind(now)
        .bind(stale_before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_claim(&self, repo: &RepoId, version: &str) -> Result<()> {
        sqlx::query("DELETE FROM ingestion_claims WHERE repo_id = ? AND content_version = ?")
            .bind(repo.as_str())
            .bind(version)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn latest_ingestion(&self, repo: &RepoId) -> Result<Option<IngestionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT repo_id, content_version, ingested_at FROM ingestions
            WHERE repo_id = ?
            ORDER BY ingested_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(repo.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn purge_repository(&self, repo: &RepoId) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = delete_repository(&mut tx, repo).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn replace_repository(
        &self,
        repo: &RepoId,
        code: &[EmbeddedChunk],
        text: &[EmbeddedChunk],
    ) -> Result<u64> {
        ensure_kind(ChunkKind::Code, code)?;
        ensure_kind(ChunkKind::Text, text)?;

        // Dropping the transaction on error rolls everything back.
        let mut tx = self.pool.begin().await?;
        let removed = delete_repository(&mut tx, repo).await?;
        insert_records(&mut tx, ChunkKind::Code, code).await?;
        insert_records(&mut tx, ChunkKind::Text, text).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn count(&self, kind: ChunkKind, repo: Option<&RepoId>) -> Result<u64> {
        let n: i64 = match repo {
            Some(r) => {
                sqlx::query_scalar(&format!(
                    "SELECT COUNT(*) FROM {} WHERE repo_id = ?",
                    table(kind)
                ))
                .bind(r.as_str())
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table(kind)))
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(n as u64)
    }

    async fn ingestions(&self) -> Result<Vec<IngestionRecord>> {
        let rows = sqlx::query(
            "SELECT repo_id, content_version, ingested_at FROM ingestions ORDER BY ingested_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_record).collect()
    }
}
