//! Ingestion pipeline.
//!
//! Turns a [`RepositorySource`] into stored, embedded chunks:
//!
//! ```text
//! version → ledger check → claim → list → filter → read → validate
//!         → chunk (+ summary) → embed → replace chunks → mark → release
//! ```
//!
//! Ingestion is idempotent per `(repository, content_version)`: a version
//! already in the ledger is skipped without touching the store, and a version
//! being ingested concurrently elsewhere reports
//! [`IngestStatus::InProgress`]. Per-file read and validation failures only
//! skip that file; embedding and store failures abort the run and release
//! the claim so it can be retried. A claim left behind by a killed process
//! expires after the claim TTL.
//!
//! The old chunks of a repository are swapped for the new ones in a single
//! [`VectorStore::replace_repository`] call, so a failed write leaves the
//! previously ingested version intact.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::chunk::{chunk_file, ChunkingParams};
use crate::filter::FileFilter;
use crate::models::{ChunkKind, EmbeddedChunk, RepoId};
use crate::router::EmbeddingRouter;
use crate::store::VectorStore;
use crate::summary::SummaryBuilder;

/// One file in a repository listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Repository-relative path with `/` separators.
    pub path: String,
    pub size: u64,
}

/// Where repository files come from (a local checkout, a git clone, ...).
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Every candidate file. Filtering happens in the pipeline.
    async fn list_files(&self) -> Result<Vec<FileEntry>>;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// A stable identifier of the current content (a commit SHA, a digest).
    /// `None` disables idempotency for this source.
    async fn content_version(&self) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Ingested,
    Skipped,
    InProgress,
}

impl std::fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            IngestStatus::Ingested => "ingested",
            IngestStatus::Skipped => "skipped",
            IngestStatus::InProgress => "in_progress",
        })
    }
}

/// Outcome of one [`IngestPipeline::ingest`] call.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub repo: RepoId,
    pub content_version: Option<String>,
    pub status: IngestStatus,
    pub files_seen: usize,
    pub files_accepted: usize,
    pub files_rejected: usize,
    pub chunk_count: usize,
    pub code_chunks: usize,
    pub text_chunks: usize,
}

impl IngestReport {
    fn empty(repo: &RepoId, version: Option<String>, status: IngestStatus) -> Self {
        Self {
            repo: repo.clone(),
            content_version: version,
            status,
            files_seen: 0,
            files_accepted: 0,
            files_rejected: 0,
            chunk_count: 0,
            code_chunks: 0,
            text_chunks: 0,
        }
    }
}

/// How long an unreleased claim blocks other ingestions of the same version.
pub const DEFAULT_CLAIM_TTL: Duration = Duration::from_secs(60 * 60);

pub struct IngestPipeline {
    store: Arc<dyn VectorStore>,
    router: EmbeddingRouter,
    filter: FileFilter,
    chunking: ChunkingParams,
    claim_ttl: Duration,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        router: EmbeddingRouter,
        filter: FileFilter,
        chunking: ChunkingParams,
    ) -> Self {
        Self {
            store,
            router,
            filter,
            chunking,
            claim_ttl: DEFAULT_CLAIM_TTL,
        }
    }

    pub fn with_claim_ttl(mut self, ttl: Duration) -> Self {
        self.claim_ttl = ttl;
        self
    }

    /// Ingest one repository from `source`.
    pub async fn ingest(
        &self,
        repo: &RepoId,
        source: &dyn RepositorySource,
    ) -> Result<IngestReport> {
        let version = source
            .content_version()
            .await
            .with_context(|| format!("Failed to determine content version of {}", repo))?;

        if let Some(v) = &version {
            if self.store.is_ingested(repo, v).await? {
                tracing::info!(repo = %repo, version = %v, "already ingested; skipping");
                return Ok(IngestReport::empty(repo, version, IngestStatus::Skipped));
            }
        }

        // Unversioned sources get a unique ledger key per run.
        let ledger_key = version
            .clone()
            .unwrap_or_else(|| format!("unversioned-{}", Utc::now().timestamp_millis()));

        if !self
            .store
            .claim_ingestion(repo, &ledger_key, self.claim_ttl)
            .await?
        {
            tracing::info!(repo = %repo, version = %ledger_key, "ingestion already in progress");
            return Ok(IngestReport::empty(repo, version, IngestStatus::InProgress));
        }

        // Mark before releasing, so the version never looks unclaimed and unrecorded.
        let outcome = match self.run(repo, source, version).await {
            Ok(report) => self
                .store
                .mark_ingested(repo, &ledger_key)
                .await
                .map(|()| report),
            Err(e) => Err(e),
        };
        let released = self.store.release_claim(repo, &ledger_key).await;

        let report = match outcome {
            Ok(report) => report,
            Err(e) => {
                if let Err(release_err) = released {
                    tracing::warn!(repo = %repo, error = %release_err, "failed to release ingestion claim");
                }
                return Err(e);
            }
        };
        released?;

        tracing::info!(
            repo = %repo,
            version = %ledger_key,
            files = report.files_accepted,
            chunks = report.chunk_count,
            "ingestion complete"
        );
        Ok(report)
    }

    async fn run(
        &self,
        repo: &RepoId,
        source: &dyn RepositorySource,
        version: Option<String>,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::empty(repo, version, IngestStatus::Ingested);
        let files = source
            .list_files()
            .await
            .with_context(|| format!("Failed to list files of {}", repo))?;
        report.files_seen = files.len();

        let mut chunks = Vec::new();
        let mut summary = SummaryBuilder::new();

        for entry in &files {
            if let Err(reason) = self.filter.check_entry(&entry.path, entry.size) {
                tracing::debug!(path = %entry.path, %reason, "skipping file");
                report.files_rejected += 1;
                continue;
            }

            let bytes = match source.read_file(&entry.path).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!(path = %entry.path, error = %e, "failed to read file; skipping");
                    report.files_rejected += 1;
                    continue;
                }
            };

            let content = match self.filter.validate_content(&bytes) {
                Ok(c) => c,
                Err(reason) => {
                    tracing::debug!(path = %entry.path, %reason, "skipping file");
                    report.files_rejected += 1;
                    continue;
                }
            };

            report.files_accepted += 1;
            summary.observe(&entry.path, &content);
            chunks.extend(chunk_file(repo, &entry.path, &content, &self.chunking));
        }

        if let Some(s) = summary.build(repo) {
            chunks.push(s);
        }

        let embedded = self.router.route_and_embed(chunks).await?;
        let (code, text): (Vec<EmbeddedChunk>, Vec<EmbeddedChunk>) = embedded
            .into_iter()
            .partition(|e| e.chunk.kind == ChunkKind::Code);

        let purged = self
            .store
            .replace_repository(repo, &code, &text)
            .await
            .with_context(|| format!("Failed to store chunks of {}", repo))?;
        if purged > 0 {
            tracing::info!(repo = %repo, purged, "replaced previous chunks");
        }

        report.code_chunks = code.len();
        report.text_chunks = text.len();
        report.chunk_count = code.len() + text.len();
        Ok(report)
    }
}
