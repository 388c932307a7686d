//! Core data models shared by the ingestion and retrieval paths.
//!
//! These types represent the chunks, embedded chunks, ledger records, and
//! retrieval results that flow between the chunker, the embedding router,
//! the [`VectorStore`](crate::store::VectorStore), and the
//! [`Retriever`](crate::retrieve::Retriever).

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::GitSageError;

/// Normalized repository identity, the partition key for every read and write.
///
/// Built with [`RepoId::parse`], which trims whitespace and strips trailing
/// `/` and `.git` suffixes so that `https://github.com/a/b.git/` and
/// `https://github.com/a/b` name the same repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RepoId(String);

impl RepoId {
    /// Normalize a repository URL (or any stable repository name).
    pub fn parse(raw: &str) -> Result<Self, GitSageError> {
        let mut s = raw.trim();
        loop {
            let before = s.len();
            s = s.trim_end_matches('/');
            if let Some(stripped) = s.strip_suffix(".git") {
                s = stripped;
            }
            if s.len() == before {
                break;
            }
        }
        if s.is_empty() {
            return Err(GitSageError::InvalidRepository(raw.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which embedding space (and which store collection) a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Code,
    Text,
}

impl ChunkKind {
    pub const ALL: [ChunkKind; 2] = [ChunkKind::Code, ChunkKind::Text];

    pub fn as_str(self) -> &'static str {
        match self {
            ChunkKind::Code => "code",
            ChunkKind::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "code" => Some(ChunkKind::Code),
            "text" => Some(ChunkKind::Text),
            _ => None,
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a chunk comes from a file or is the curated repository summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkRole {
    File,
    Summary,
}

/// Source language, detected purely from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    C,
    Cpp,
    Go,
    Rust,
    Markdown,
    Yaml,
    Json,
    Toml,
    Ini,
    Env,
    Text,
}

impl Language {
    /// Look up a path's language by extension. Unmapped extensions are [`Language::Text`].
    pub fn detect(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "py" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "java" => Language::Java,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" => Language::Cpp,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "md" | "markdown" => Language::Markdown,
            "yaml" | "yml" => Language::Yaml,
            "json" => Language::Json,
            "toml" => Language::Toml,
            "ini" => Language::Ini,
            "env" => Language::Env,
            _ => Language::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Markdown => "markdown",
            Language::Yaml => "yaml",
            Language::Json => "json",
            Language::Toml => "toml",
            Language::Ini => "ini",
            Language::Env => "env",
            Language::Text => "text",
        }
    }

    /// Inverse of [`Language::as_str`], used when reading rows back from a store.
    pub fn parse(s: &str) -> Self {
        match s {
            "python" => Language::Python,
            "javascript" => Language::JavaScript,
            "typescript" => Language::TypeScript,
            "java" => Language::Java,
            "c" => Language::C,
            "cpp" => Language::Cpp,
            "go" => Language::Go,
            "rust" => Language::Rust,
            "markdown" => Language::Markdown,
            "yaml" => Language::Yaml,
            "json" => Language::Json,
            "toml" => Language::Toml,
            "ini" => Language::Ini,
            "env" => Language::Env,
            _ => Language::Text,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retrievable unit of content extracted from exactly one file.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub repo: RepoId,
    pub path: String,
    pub index: usize,
    pub language: Language,
    pub kind: ChunkKind,
    pub role: ChunkRole,
    pub content: String,
    pub size: usize,
}

impl Chunk {
    /// Metadata stored alongside the chunk's vector.
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            repo: self.repo.clone(),
            path: self.path.clone(),
            language: self.language,
            kind: self.kind,
            summary: self.role == ChunkRole::Summary,
        }
    }
}

/// A [`Chunk`] plus the vector produced by the embedder matching its kind.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Metadata persisted with every vector; `repo` is the isolation key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkMetadata {
    pub repo: RepoId,
    pub path: String,
    pub language: Language,
    pub kind: ChunkKind,
    pub summary: bool,
}

/// Completed ingestion of one `(repository, content_version)` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionRecord {
    pub repo: RepoId,
    pub content_version: String,
    pub ingested_at: DateTime<Utc>,
}

/// Which collection (and embedding space) a retrieved result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Code,
    Text,
}

impl From<ChunkKind> for Origin {
    fn from(kind: ChunkKind) -> Self {
        match kind {
            ChunkKind::Code => Origin::Code,
            ChunkKind::Text => Origin::Text,
        }
    }
}

/// One ranked retrieval hit. Produced per query, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedResult {
    /// Cosine similarity in the result's own space, plus any summary boost.
    pub similarity: f64,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub origin: Origin,
}
