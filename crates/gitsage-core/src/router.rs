//! Dual embedding router.
//!
//! Sends each chunk to the embedding provider of its kind: code chunks to
//! the code provider, text chunks to the text provider. Chunks are batched
//! per kind so each provider is called at most once per
//! [`EmbeddingRouter::route_and_embed`] call.

use std::sync::Arc;

use anyhow::Result;

use crate::embedding::EmbeddingProvider;
use crate::error::GitSageError;
use crate::models::{Chunk, ChunkKind, EmbeddedChunk};

/// Holds one provider per vector space.
#[derive(Clone)]
pub struct EmbeddingRouter {
    code: Arc<dyn EmbeddingProvider>,
    text: Arc<dyn EmbeddingProvider>,
}

impl EmbeddingRouter {
    pub fn new(code: Arc<dyn EmbeddingProvider>, text: Arc<dyn EmbeddingProvider>) -> Self {
        Self { code, text }
    }

    pub fn provider(&self, kind: ChunkKind) -> &Arc<dyn EmbeddingProvider> {
        match kind {
            ChunkKind::Code => &self.code,
            ChunkKind::Text => &self.text,
        }
    }

    /// Embed every chunk with the provider matching its kind.
    ///
    /// Output order is code chunks first, then text chunks, each in input
    /// order. An empty batch never reaches its provider. Any provider failure
    /// or vector count mismatch fails the whole call.
    pub async fn route_and_embed(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>> {
        let (code, text): (Vec<Chunk>, Vec<Chunk>) =
            chunks.into_iter().partition(|c| c.kind == ChunkKind::Code);

        let mut out = Vec::with_capacity(code.len() + text.len());
        for (kind, batch) in [(ChunkKind::Code, code), (ChunkKind::Text, text)] {
            if batch.is_empty() {
                continue;
            }
            out.extend(self.embed_batch(kind, batch).await?);
        }
        Ok(out)
    }

    async fn embed_batch(&self, kind: ChunkKind, batch: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>> {
        let provider = self.provider(kind);
        let payloads: Vec<String> = batch
            .iter()
            .map(|c| c.content.replace("\r\n", "\n"))
            .collect();

        tracing::debug!(
            kind = %kind,
            model = provider.model_name(),
            count = payloads.len(),
            "embedding batch"
        );

        let vectors = provider.embed(&payloads).await?;
        if vectors.len() != batch.len() {
            return Err(GitSageError::Embedding {
                provider: provider.model_name().to_string(),
                message: format!(
                    "expected {} vectors for {} chunks, got {}",
                    batch.len(),
                    kind,
                    vectors.len()
                ),
            }
            .into());
        }

        Ok(batch
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
            .collect())
    }
}
