//! Composition root.
//!
//! [`App`] owns the SQLite store and both embedding backends, constructed
//! once per process and shared by reference-counted handle with every
//! service built from them. Commands obtain their services here instead of
//! reaching for globals.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use gitsage_core::compare::ComparisonEngine;
use gitsage_core::docs::DocsGenerator;
use gitsage_core::filter::FileFilter;
use gitsage_core::generate::Generator;
use gitsage_core::ingest::IngestPipeline;
use gitsage_core::models::RepoId;
use gitsage_core::qa::QaEngine;
use gitsage_core::retrieve::Retriever;
use gitsage_core::router::EmbeddingRouter;
use gitsage_core::store::VectorStore;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::generate::create_generator;
use crate::source::is_remote;
use crate::sqlite_store::SqliteStore;
use crate::{db, migrate};

pub struct App {
    pub config: Config,
    store: Arc<SqliteStore>,
    router: EmbeddingRouter,
}

impl App {
    /// Open the database (creating the schema if needed) and build both embedders.
    pub async fn open(config: Config) -> Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::apply(&pool).await?;

        let code = create_provider(&config.embedding.code)
            .with_context(|| "Failed to initialize code embedding provider")?;
        let text = create_provider(&config.embedding.text)
            .with_context(|| "Failed to initialize text embedding provider")?;
        tracing::debug!(
            code_model = code.model_name(),
            text_model = text.model_name(),
            "embedding providers ready"
        );

        Ok(Self {
            config,
            store: Arc::new(SqliteStore::new(pool)),
            router: EmbeddingRouter::new(code, text),
        })
    }

    pub fn store(&self) -> Arc<dyn VectorStore> {
        self.store.clone()
    }

    pub fn retriever(&self) -> Retriever {
        Retriever::new(
            self.store(),
            self.router.clone(),
            self.config.retrieval.params(),
        )
    }

    pub fn pipeline(&self) -> IngestPipeline {
        IngestPipeline::new(
            self.store(),
            self.router.clone(),
            FileFilter::new(self.config.filter.limits()),
            self.config.chunking.params(),
        )
        .with_claim_ttl(self.config.ingest.claim_ttl())
    }

    /// The generation backend is only built by commands that need it, so
    /// `ingest` and `search` work without generation credentials.
    fn generator(&self) -> Result<Arc<dyn Generator>> {
        create_generator(&self.config.generation)
            .with_context(|| "Failed to initialize generation provider")
    }

    pub fn qa(&self) -> Result<QaEngine> {
        Ok(QaEngine::new(
            self.retriever(),
            self.generator()?,
            self.config.retrieval.top_k,
        ))
    }

    pub fn docs(&self) -> Result<DocsGenerator> {
        Ok(DocsGenerator::new(self.retriever(), self.generator()?))
    }

    pub fn comparison(&self) -> Result<ComparisonEngine> {
        Ok(ComparisonEngine::new(self.retriever(), self.generator()?))
    }

    pub async fn close(self) {
        self.store.pool().close().await;
    }
}

/// Repository identity for a command-line target.
///
/// Remote URLs are normalized as-is; an existing local directory is
/// identified by its canonical path, so `./widgets` and `/src/widgets`
/// name the same repository.
pub fn resolve_repo(target: &str) -> Result<RepoId> {
    if !is_remote(target) {
        let path = Path::new(target);
        if path.is_dir() {
            let canonical = path
                .canonicalize()
                .with_context(|| format!("Failed to resolve path: {}", path.display()))?;
            return Ok(RepoId::parse(&canonical.to_string_lossy())?);
        }
    }
    Ok(RepoId::parse(target)?)
}
