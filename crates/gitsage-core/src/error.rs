//! Error taxonomy for GitSage.
//!
//! Most fallible operations return [`anyhow::Result`]; the variants below are
//! the failures callers need to tell apart, recovered with
//! `err.downcast_ref::<GitSageError>()`.

use thiserror::Error;

use crate::models::ChunkKind;

#[derive(Debug, Error)]
pub enum GitSageError {
    /// No completed ingestion exists for the repository (or the requested version).
    #[error("Repository is not ready: {repo} has no completed ingestion. Ingest it first or wait for ingestion to finish.")]
    RepositoryNotReady { repo: String },

    /// An embedding backend failed or returned an unusable response.
    #[error("Embedding error ({provider}): {message}")]
    Embedding { provider: String, message: String },

    /// The repository identity normalized to nothing.
    #[error("Invalid repository identity: '{0}'")]
    InvalidRepository(String),

    /// A record was written to the collection of the other kind.
    #[error("Chunk kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: ChunkKind, found: ChunkKind },
}
