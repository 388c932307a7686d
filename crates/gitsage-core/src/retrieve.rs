//! Dual-space retriever.
//!
//! A query is embedded once per vector space, both collections are queried
//! with over-fetch, every candidate is re-scored by cosine similarity in its
//! own space, summary entries are boosted, and the two lists are merged into
//! one ranking.
//!
//! # Algorithm
//!
//! 1. Embed the query with the code provider and with the text provider.
//! 2. Query each collection for `top_k × overfetch` candidates.
//! 3. Score each candidate against the query vector from the same space. When
//!    the store did not return the stored vector, its own score is used.
//! 4. Add `summary_boost` to repository-summary entries.
//! 5. Concatenate, sort by descending similarity, truncate to `top_k`.
//!
//! A failing store query degrades to "no results"; a failing query
//! embedding is returned to the caller.

use std::sync::Arc;

use anyhow::Result;

use crate::embedding::{cosine_similarity, embed_query};
use crate::models::{ChunkKind, Origin, RepoId, RetrievedResult};
use crate::router::EmbeddingRouter;
use crate::store::VectorStore;

/// Knobs for [`Retriever`]. Defaults: over-fetch 3, summary boost 1.0.
#[derive(Debug, Clone)]
pub struct RetrievalParams {
    pub overfetch: usize,
    pub summary_boost: f64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            overfetch: 3,
            summary_boost: 1.0,
        }
    }
}

#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    router: EmbeddingRouter,
    params: RetrievalParams,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, router: EmbeddingRouter, params: RetrievalParams) -> Self {
        Self {
            store,
            router,
            params,
        }
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Return at most `top_k` results for `query`, best first.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        repo: Option<&RepoId>,
    ) -> Result<Vec<RetrievedResult>> {
        if query.trim().is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let code_query = embed_query(self.router.provider(ChunkKind::Code).as_ref(), query).await?;
        let text_query = embed_query(self.router.provider(ChunkKind::Text).as_ref(), query).await?;

        let fetch = top_k.saturating_mul(self.params.overfetch.max(1));
        let mut results = self
            .search_space(ChunkKind::Code, &code_query, fetch, repo)
            .await;
        results.extend(
            self.search_space(ChunkKind::Text, &text_query, fetch, repo)
                .await,
        );

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.metadata.path.cmp(&b.metadata.path))
                .then_with(|| a.content.cmp(&b.content))
        });
        results.truncate(top_k);
        Ok(results)
    }

    async fn search_space(
        &self,
        kind: ChunkKind,
        query_vec: &[f32],
        fetch: usize,
        repo: Option<&RepoId>,
    ) -> Vec<RetrievedResult> {
        let neighbors = match self.store.query(kind, query_vec, fetch, repo).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(kind = %kind, error = %e, "vector store query failed; continuing without results");
                return Vec::new();
            }
        };

        neighbors
            .into_iter()
            .map(|n| {
                let mut similarity = match &n.vector {
                    Some(v) => cosine_similarity(query_vec, v) as f64,
                    None => n.score,
                };
                if n.metadata.summary {
                    similarity += self.params.summary_boost;
                }
                RetrievedResult {
                    similarity,
                    content: n.content,
                    metadata: n.metadata,
                    origin: Origin::from(kind),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::bail;
    use async_trait::async_trait;

    use super::*;
    use crate::chunk::make_chunk;
    use crate::embedding::{EmbeddingProvider, HashingEmbedder};
    use crate::models::{ChunkRole, EmbeddedChunk, IngestionRecord, Language};
    use crate::store::memory::InMemoryStore;
    use crate::store::Neighbor;

    /// Maps every text to the same vector.
    struct Constant(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for Constant {
        fn model_name(&self) -> &str {
            "constant"
        }
        fn dims(&self) -> usize {
            self.0.len()
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![self.0.clone(); texts.len()])
        }
    }

    struct Failing;

    #[async_trait]
    impl EmbeddingProvider for Failing {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            bail!("backend unreachable")
        }
    }

    fn repo(name: &str) -> RepoId {
        RepoId::parse(&format!("https://github.com/acme/{}", name)).unwrap()
    }

    fn record(
        repo: &RepoId,
        path: &str,
        kind: ChunkKind,
        role: ChunkRole,
        vector: Vec<f32>,
    ) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: make_chunk(repo, path, 0, Language::Text, kind, role, path.to_string()),
            vector,
        }
    }

    fn constant_router() -> EmbeddingRouter {
        EmbeddingRouter::new(
            Arc::new(Constant(vec![1.0, 0.0])),
            Arc::new(Constant(vec![1.0, 0.0])),
        )
    }

    #[tokio::test]
    async fn test_summary_boost_outranks_closer_chunk() {
        let store = Arc::new(InMemoryStore::new());
        let a = repo("a");
        // Summary at cosine 0.50, plain chunk at cosine 0.90.
        let summary_vec = vec![0.5, (1.0f32 - 0.25).sqrt()];
        let near_vec = vec![0.9, (1.0f32 - 0.81).sqrt()];
        store
            .add(
                ChunkKind::Text,
                &[
                    record(&a, "(repository summary)", ChunkKind::Text, ChunkRole::Summary, summary_vec),
                    record(&a, "docs/guide.md", ChunkKind::Text, ChunkRole::File, near_vec),
                ],
            )
            .await
            .unwrap();

        let retriever = Retriever::new(store, constant_router(), RetrievalParams::default());
        let results = retriever.retrieve("what is this", 5, Some(&a)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].metadata.summary);
        assert!((results[0].similarity - 1.5).abs() < 1e-4);
        assert!((results[1].similarity - 0.9).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_merges_both_spaces_with_origin() {
        let store = Arc::new(InMemoryStore::new());
        let a = repo("a");
        store
            .add(ChunkKind::Code, &[record(&a, "src/lib.rs", ChunkKind::Code, ChunkRole::File, vec![0.8, 0.6])])
            .await
            .unwrap();
        store
            .add(ChunkKind::Text, &[record(&a, "README.md", ChunkKind::Text, ChunkRole::File, vec![1.0, 0.0])])
            .await
            .unwrap();

        let retriever = Retriever::new(store, constant_router(), RetrievalParams::default());
        let results = retriever.retrieve("anything", 10, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].origin, Origin::Text);
        assert_eq!(results[1].origin, Origin::Code);
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[tokio::test]
    async fn test_equal_scores_ordered_by_path() {
        let store = Arc::new(InMemoryStore::new());
        let a = repo("a");
        store
            .add(ChunkKind::Code, &[record(&a, "src/zeta.rs", ChunkKind::Code, ChunkRole::File, vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .add(
                ChunkKind::Text,
                &[
                    record(&a, "docs/b.md", ChunkKind::Text, ChunkRole::File, vec![1.0, 0.0]),
                    record(&a, "docs/a.md", ChunkKind::Text, ChunkRole::File, vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let retriever = Retriever::new(store, constant_router(), RetrievalParams::default());
        for _ in 0..3 {
            let paths: Vec<String> = retriever
                .retrieve("anything", 10, None)
                .await
                .unwrap()
                .into_iter()
                .map(|r| r.metadata.path)
                .collect();
            assert_eq!(paths, vec!["docs/a.md", "docs/b.md", "src/zeta.rs"]);
        }
    }

    #[tokio::test]
    async fn test_repository_isolation() {
        let store = Arc::new(InMemoryStore::new());
        let (a, b) = (repo("a"), repo("b"));
        let router = EmbeddingRouter::new(
            Arc::new(HashingEmbedder::new(64)),
            Arc::new(HashingEmbedder::new(64)),
        );
        let embed = |s: &str| HashingEmbedder::new(64).embed_one(s);
        store
            .add(
                ChunkKind::Text,
                &[
                    record(&a, "a.md", ChunkKind::Text, ChunkRole::File, embed("database pool")),
                    record(&b, "b.md", ChunkKind::Text, ChunkRole::File, embed("database pool")),
                ],
            )
            .await
            .unwrap();

        let retriever = Retriever::new(store, router, RetrievalParams::default());
        for (id, path) in [(&a, "a.md"), (&b, "b.md")] {
            let results = retriever.retrieve("database pool", 10, Some(id)).await.unwrap();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].metadata.path, path);
        }
    }

    #[tokio::test]
    async fn test_truncates_and_handles_degenerate_queries() {
        let store = Arc::new(InMemoryStore::new());
        let a = repo("a");
        let records: Vec<EmbeddedChunk> = (0..5)
            .map(|i| EmbeddedChunk {
                chunk: make_chunk(&a, "f.txt", i, Language::Text, ChunkKind::Text, ChunkRole::File, format!("c{}", i)),
                vector: vec![1.0, i as f32],
            })
            .collect();
        store.add(ChunkKind::Text, &records).await.unwrap();

        let retriever = Retriever::new(store, constant_router(), RetrievalParams::default());
        assert_eq!(retriever.retrieve("q", 2, None).await.unwrap().len(), 2);
        assert!(retriever.retrieve("q", 0, None).await.unwrap().is_empty());
        assert!(retriever.retrieve("   ", 5, None).await.unwrap().is_empty());
    }

    /// Fails every query; the ledger methods are never reached.
    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn add(&self, _: ChunkKind, _: &[EmbeddedChunk]) -> Result<()> {
            bail!("read-only")
        }
        async fn query(&self, _: ChunkKind, _: &[f32], _: usize, _: Option<&RepoId>) -> Result<Vec<Neighbor>> {
            bail!("connection refused")
        }
        async fn is_ingested(&self, _: &RepoId, _: &str) -> Result<bool> {
            Ok(true)
        }
        async fn mark_ingested(&self, _: &RepoId, _: &str) -> Result<()> {
            Ok(())
        }
        async fn claim_ingestion(&self, _: &RepoId, _: &str, _: Duration) -> Result<bool> {
            Ok(true)
        }
        async fn release_claim(&self, _: &RepoId, _: &str) -> Result<()> {
            Ok(())
        }
        async fn latest_ingestion(&self, _: &RepoId) -> Result<Option<IngestionRecord>> {
            Ok(None)
        }
        async fn purge_repository(&self, _: &RepoId) -> Result<u64> {
            Ok(0)
        }
        async fn replace_repository(&self, _: &RepoId, _: &[EmbeddedChunk], _: &[EmbeddedChunk]) -> Result<u64> {
            bail!("read-only")
        }
        async fn count(&self, _: ChunkKind, _: Option<&RepoId>) -> Result<u64> {
            Ok(0)
        }
        async fn ingestions(&self) -> Result<Vec<IngestionRecord>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_empty() {
        let retriever = Retriever::new(Arc::new(BrokenStore), constant_router(), RetrievalParams::default());
        let results = retriever.retrieve("anything", 5, None).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_query_embedding_failure_propagates() {
        let router = EmbeddingRouter::new(Arc::new(Failing), Arc::new(Constant(vec![1.0, 0.0])));
        let retriever = Retriever::new(Arc::new(InMemoryStore::new()), router, RetrievalParams::default());
        assert!(retriever.retrieve("anything", 5, None).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_stored_vector_uses_store_score() {
        struct ScoreOnly;

        #[async_trait]
        impl VectorStore for ScoreOnly {
            async fn add(&self, _: ChunkKind, _: &[EmbeddedChunk]) -> Result<()> {
                Ok(())
            }
            async fn query(&self, kind: ChunkKind, _: &[f32], _: usize, _: Option<&RepoId>) -> Result<Vec<Neighbor>> {
                if kind == ChunkKind::Code {
                    return Ok(Vec::new());
                }
                let a = RepoId::parse("https://github.com/acme/a").unwrap();
                let chunk = make_chunk(&a, "x.md", 0, Language::Markdown, ChunkKind::Text, ChunkRole::File, "x".into());
                Ok(vec![Neighbor {
                    id: chunk.id.clone(),
                    content: chunk.content.clone(),
                    metadata: chunk.metadata(),
                    vector: None,
                    score: 0.42,
                }])
            }
            async fn is_ingested(&self, _: &RepoId, _: &str) -> Result<bool> {
                Ok(false)
            }
            async fn mark_ingested(&self, _: &RepoId, _: &str) -> Result<()> {
                Ok(())
            }
            async fn claim_ingestion(&self, _: &RepoId, _: &str, _: Duration) -> Result<bool> {
                Ok(true)
            }
            async fn release_claim(&self, _: &RepoId, _: &str) -> Result<()> {
                Ok(())
            }
            async fn latest_ingestion(&self, _: &RepoId) -> Result<Option<IngestionRecord>> {
                Ok(None)
            }
            async fn purge_repository(&self, _: &RepoId) -> Result<u64> {
                Ok(0)
            }
            async fn replace_repository(&self, _: &RepoId, _: &[EmbeddedChunk], _: &[EmbeddedChunk]) -> Result<u64> {
                Ok(0)
            }
            async fn count(&self, _: ChunkKind, _: Option<&RepoId>) -> Result<u64> {
                Ok(0)
            }
            async fn ingestions(&self) -> Result<Vec<IngestionRecord>> {
                Ok(Vec::new())
            }
        }

        let retriever = Retriever::new(Arc::new(ScoreOnly), constant_router(), RetrievalParams::default());
        let results = retriever.retrieve("x", 3, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].similarity - 0.42).abs() < 1e-9);
    }
}
