//! Vector store abstraction.
//!
//! The [`VectorStore`] trait holds two parallel collections, one per
//! [`ChunkKind`], plus the ingestion ledger that makes re-ingestion
//! idempotent per `(repository, content_version)`.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! [`memory::InMemoryStore`] lives here; the persistent SQLite store lives in
//! the `gitsage` app crate.

pub mod memory;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkKind, ChunkMetadata, EmbeddedChunk, IngestionRecord, RepoId};

/// A nearest-neighbour candidate returned by [`VectorStore::query`].
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    /// The stored embedding, when the backend can return it.
    pub vector: Option<Vec<f32>>,
    /// Backend-side relevance score (cosine similarity for the bundled stores).
    pub score: f64,
}

/// Abstract storage backend for GitSage.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorStore::add) | Upsert embedded chunks into one collection |
/// | [`query`](VectorStore::query) | Nearest neighbours in one collection |
/// | [`is_ingested`](VectorStore::is_ingested) | Exact ledger lookup |
/// | [`mark_ingested`](VectorStore::mark_ingested) | Append to the ledger |
/// | [`claim_ingestion`](VectorStore::claim_ingestion) | Exclusive in-progress marker, expiring after a TTL |
/// | [`replace_repository`](VectorStore::replace_repository) | Swap a repository's chunks atomically |
/// | [`purge_repository`](VectorStore::purge_repository) | Drop a repository's chunks |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert records by chunk id into the `kind` collection.
    ///
    /// Fails with [`GitSageError::KindMismatch`](crate::error::GitSageError::KindMismatch)
    /// if any record's chunk kind differs from `kind`; nothing is written in
    /// that case.
    async fn add(&self, kind: ChunkKind, records: &[EmbeddedChunk]) -> Result<()>;

    /// Return up to `top_k` neighbours of `vector`, optionally restricted to one repository.
    async fn query(
        &self,
        kind: ChunkKind,
        vector: &[f32],
        top_k: usize,
        repo: Option<&RepoId>,
    ) -> Result<Vec<Neighbor>>;

    /// True iff a ledger record exists with exactly this repository and version.
    async fn is_ingested(&self, repo: &RepoId, version: &str) -> Result<bool>;

    /// Append a ledger record. Marking the same pair twice is a no-op.
    async fn mark_ingested(&self, repo: &RepoId, version: &str) -> Result<()>;

    /// Atomically claim an ingestion. Returns `false` if another claim on the
    /// same pair was taken less than `ttl` ago; an older claim is taken over,
    /// since its holder is assumed to have died without releasing it.
    async fn claim_ingestion(&self, repo: &RepoId, version: &str, ttl: Duration) -> Result<bool>;

    /// Drop a claim taken with [`claim_ingestion`](VectorStore::claim_ingestion).
    async fn release_claim(&self, repo: &RepoId, version: &str) -> Result<()>;

    /// The most recent completed ingestion of a repository, if any.
    async fn latest_ingestion(&self, repo: &RepoId) -> Result<Option<IngestionRecord>>;

    /// Remove every chunk of a repository from both collections. Returns rows removed.
    async fn purge_repository(&self, repo: &RepoId) -> Result<u64>;

    /// Replace all of a repository's chunks with `code` and `text` in one
    /// atomic step. On error the previous chunks are left untouched.
    /// Returns the number of rows removed.
    async fn replace_repository(
        &self,
        repo: &RepoId,
        code: &[EmbeddedChunk],
        text: &[EmbeddedChunk],
    ) -> Result<u64>;

    /// Number of records in one collection, optionally for one repository.
    async fn count(&self, kind: ChunkKind, repo: Option<&RepoId>) -> Result<u64>;

    /// All ledger records, oldest first.
    async fn ingestions(&self) -> Result<Vec<IngestionRecord>>;
}

/// Reject a batch containing records of the wrong kind.
pub fn ensure_kind(kind: ChunkKind, records: &[EmbeddedChunk]) -> Result<()> {
    if let Some(bad) = records.iter().find(|r| r.chunk.kind != kind) {
        return Err(crate::error::GitSageError::KindMismatch {
            expected: kind,
            found: bad.chunk.kind,
        }
        .into());
    }
    Ok(())
}
