//! In-memory [`VectorStore`] implementation for tests and embedding.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Queries are
//! brute-force cosine similarity over every stored vector of the collection.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::embedding::cosine_similarity;
use crate::models::{ChunkKind, EmbeddedChunk, IngestionRecord, RepoId};

use super::{ensure_kind, Neighbor, VectorStore};

#[derive(Default)]
struct Collections {
    code: HashMap<String, EmbeddedChunk>,
    text: HashMap<String, EmbeddedChunk>,
}

impl Collections {
    fn get(&self, kind: ChunkKind) -> &HashMap<String, EmbeddedChunk> {
        match kind {
            ChunkKind::Code => &self.code,
            ChunkKind::Text => &self.text,
        }
    }

    fn get_mut(&mut self, kind: ChunkKind) -> &mut HashMap<String, EmbeddedChunk> {
        match kind {
            ChunkKind::Code => &mut self.code,
            ChunkKind::Text => &mut self.text,
        }
    }

    fn purge(&mut self, repo: &RepoId) -> u64 {
        let mut removed = 0u64;
        for kind in ChunkKind::ALL {
            let target = self.get_mut(kind);
            let before = target.len();
            target.retain(|_, r| &r.chunk.repo != repo);
            removed += (before - target.len()) as u64;
        }
        removed
    }

    fn insert(&mut self, kind: ChunkKind, records: &[EmbeddedChunk]) {
        let target = self.get_mut(kind);
        for r in records {
            target.insert(r.chunk.id.clone(), r.clone());
        }
    }
}

/// In-memory store for tests and short-lived processes.
#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<Collections>,
    ledger: RwLock<Vec<IngestionRecord>>,
    claims: RwLock<HashMap<(RepoId, String), DateTime<Utc>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn add(&self, kind: ChunkKind, records: &[EmbeddedChunk]) -> Result<()> {
        ensure_kind(kind, records)?;
        write(&self.collections)?.insert(kind, records);
        Ok(())
    }

    async fn query(
        &self,
        kind: ChunkKind,
        vector: &[f32],
        top_k: usize,
        repo: Option<&RepoId>,
    ) -> Result<Vec<Neighbor>> {
        let collections = read(&self.collections)?;
        let mut neighbors: Vec<Neighbor> = collections
            .get(kind)
            .values()
            .filter(|r| repo.map_or(true, |id| &r.chunk.repo == id))
            .map(|r| Neighbor {
                id: r.chunk.id.clone(),
                content: r.chunk.content.clone(),
                metadata: r.chunk.metadata(),
                vector: Some(r.vector.clone()),
                score: cosine_similarity(vector, &r.vector) as f64,
            })
            .collect();
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
        let ledger = read(&self.ledger)?;
        Ok(ledger
            .iter()
            .any(|r| &r.repo == repo && r.content_version == version))
    }

    async fn mark_ingested(&self, repo: &RepoId, version: &str) -> Result<()> {
        let mut ledger = write(&self.ledger)?;
        if ledger
            .iter()
            .any(|r| &r.repo == repo && r.content_version == version)
        {
            return Ok(());
        }
        ledger.push(IngestionRecord {
            repo: repo.clone(),
            content_version: version.to_string(),
            ingested_at: Utc::now(),
        });
        Ok(())
    }

    async fn claim_ingestion(&self, repo: &RepoId, version: &str, ttl: Duration) -> Result<bool> {
        let now = Utc::now();
        let mut claims = write(&self.claims)?;
        let key = (repo.clone(), version.to_string());
        let held = |claimed_at: &DateTime<Utc>| {
            now.signed_duration_since(*claimed_at)
                .to_std()
                .unwrap_or_default()
                <= ttl
        };
        match claims.get(&key) {
            Some(claimed_at) if held(claimed_at) => Ok(false),
            _ => {
                claims.insert(key, now);
                Ok(true)
            }
        }
    }

    async fn release_claim(&self, repo: &RepoId, version: &str) -> Result<()> {
        let mut claims = write(&self.claims)?;
        claims.remove(&(repo.clone(), version.to_string()));
        Ok(())
    }

    async fn latest_ingestion(&self, repo: &RepoId) -> Result<Option<IngestionRecord>> {
        let ledger = read(&self.ledger)?;
        Ok(ledger.iter().rev().find(|r| &r.repo == repo).cloned())
    }

    async fn purge_repository(&self, repo: &RepoId) -> Result<u64> {
        Ok(write(&self.collections)?.purge(repo))
    }

    async fn replace_repository(
        &self,
        repo: &RepoId,
        code: &[EmbeddedChunk],
        text: &[EmbeddedChunk],
    ) -> Result<u64> {
        ensure_kind(ChunkKind::Code, code)?;
        ensure_kind(ChunkKind::Text, text)?;
        let mut collections = write(&self.collections)?;
        let removed = collections.purge(repo);
        collections.insert(ChunkKind::Code, code);
        collections.insert(ChunkKind::Text, text);
        Ok(removed)
    }

    async fn count(&self, kind: ChunkKind, repo: Option<&RepoId>) -> Result<u64> {
        let collections = read(&self.collections)?;
        Ok(collections
            .get(kind)
            .values()
            .filter(|r| repo.map_or(true, |id| &r.chunk.repo == id))
            .count() as u64)
    }

    async fn ingestions(&self) -> Result<Vec<IngestionRecord>> {
        Ok(read(&self.ledger)?.clone())
    }
}
