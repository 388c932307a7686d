//! Question answering over one ingested repository.
//!
//! Questions are classified into a [`QuestionMode`]. Structural modes
//! (inventory, structure) are answered deterministically from the metadata
//! of retrieved chunks and never reach the generator; explanations are
//! answered by the generator from a summary-first context.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::error::GitSageError;
use crate::generate::{generate_or_default, Generator, NO_ANSWER};
use crate::models::{RepoId, RetrievedResult};
use crate::retrieve::Retriever;
use crate::store::VectorStore;

pub const NO_INVENTORY: &str = "No explicit inventory items found.";

const INVENTORY_HINTS: &[&str] = &[
    "which files",
    "what files",
    "which file",
    "what file",
    "what data",
    "which data",
    "what algorithm",
    "which algorithm",
    "what feature",
    "which feature",
    "implemented",
];

const STRUCTURE_HINTS: &[&str] = &[
    "structure",
    "structured",
    "organization",
    "organized",
    "layout",
    "folders",
    "directory",
];

const REPO_INTENT_HINTS: &[&str] = &[
    "what is this repository",
    "purpose of this repository",
    "about this repository",
    "what does this repo do",
    "main purpose of this repository",
    "why was this repository created",
];

/// Repository-intent questions retrieve fewer, stronger chunks.
const REPO_INTENT_TOP_K: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionMode {
    Inventory,
    Structure,
    Explanation,
}

impl QuestionMode {
    pub fn detect(question: &str) -> Self {
        let q = question.to_lowercase();
        if INVENTORY_HINTS.iter().any(|k| q.contains(k)) {
            QuestionMode::Inventory
        } else if STRUCTURE_HINTS.iter().any(|k| q.contains(k)) {
            QuestionMode::Structure
        } else {
            QuestionMode::Explanation
        }
    }
}

pub fn is_repo_intent(question: &str) -> bool {
    let q = question.to_lowercase();
    REPO_INTENT_HINTS.iter().any(|k| q.contains(k))
}

/// Fail with [`GitSageError::RepositoryNotReady`] unless the repository (or
/// the given version of it) has a completed ingestion.
pub async fn ensure_ready(
    store: &dyn VectorStore,
    repo: &RepoId,
    version: Option<&str>,
) -> Result<()> {
    let ready = match version {
        Some(v) => store.is_ingested(repo, v).await?,
        None => store.latest_ingestion(repo).await?.is_some(),
    };
    if !ready {
        return Err(GitSageError::RepositoryNotReady {
            repo: repo.to_string(),
        }
        .into());
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub mode: QuestionMode,
    pub text: String,
    /// Distinct paths of the chunks the answer was built from.
    pub sources: Vec<String>,
}

pub struct QaEngine {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl QaEngine {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>, top_k: usize) -> Self {
        Self {
            retriever,
            generator,
            top_k,
        }
    }

    pub async fn answer(
        &self,
        repo: &RepoId,
        question: &str,
        version: Option<&str>,
    ) -> Result<Answer> {
        ensure_ready(self.retriever.store().as_ref(), repo, version).await?;

        let mode = QuestionMode::detect(question);
        let k = if is_repo_intent(question) {
            REPO_INTENT_TOP_K
        } else {
            self.top_k
        };
        let retrieved = self.retriever.retrieve(question, k, Some(repo)).await?;
        tracing::info!(repo = %repo, ?mode, k, retrieved = retrieved.len(), "answering question");

        let sources = distinct_paths(&retrieved);
        let text = match mode {
            QuestionMode::Structure => structure_answer(&retrieved),
            QuestionMode::Inventory => inventory_answer(&retrieved),
            QuestionMode::Explanation if retrieved.is_empty() => NO_ANSWER.to_string(),
            QuestionMode::Explanation => {
                let prompt = explanation_prompt(&build_context(&retrieved), question);
                generate_or_default(self.generator.as_ref(), &prompt).await?
            }
        };

        Ok(Answer {
            mode,
            text,
            sources,
        })
    }
}

fn distinct_paths(results: &[RetrievedResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| !r.metadata.summary)
        .map(|r| r.metadata.path.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn languages(results: &[RetrievedResult]) -> BTreeSet<&'static str> {
    results
        .iter()
        .filter(|r| !r.metadata.summary)
        .map(|r| r.metadata.language.as_str())
        .collect()
}

fn push_section(out: &mut Vec<String>, title: &str, items: impl IntoIterator<Item = String>) {
    out.push(String::new());
    out.push(format!("{}:", title));
    out.extend(items.into_iter().map(|i| format!("- {}", i)));
}

/// Directories, files and languages of the retrieved chunks.
pub fn structure_answer(results: &[RetrievedResult]) -> String {
    let paths = distinct_paths(results);
    if paths.is_empty() {
        return NO_INVENTORY.to_string();
    }

    let dirs: BTreeSet<String> = paths
        .iter()
        .map(|p| match p.rfind('/') {
            Some(pos) => p[..pos].to_string(),
            None => "./".to_string(),
        })
        .collect();

    let mut out = vec!["Repository Structure (from indexed files):".to_string()];
    push_section(&mut out, "Directories", dirs);
    push_section(&mut out, "Files", paths);
    let langs = languages(results);
    if !langs.is_empty() {
        push_section(&mut out, "Languages", langs.into_iter().map(String::from));
    }
    out.join("\n")
}

/// Files, chunk types and languages of the retrieved chunks.
pub fn inventory_answer(results: &[RetrievedResult]) -> String {
    let paths = distinct_paths(results);
    let types: BTreeSet<&str> = results
        .iter()
        .map(|r| {
            if r.metadata.summary {
                "repo_summary"
            } else {
                r.metadata.kind.as_str()
            }
        })
        .collect();
    let langs = languages(results);

    if paths.is_empty() && langs.is_empty() {
        return NO_INVENTORY.to_string();
    }

    let mut out = vec!["Inventory of explicit artifacts found:".to_string()];
    if !paths.is_empty() {
        push_section(&mut out, "Files", paths);
    }
    if !types.is_empty() {
        push_section(&mut out, "Types", types.into_iter().map(String::from));
    }
    if !langs.is_empty() {
        push_section(&mut out, "Languages", langs.into_iter().map(String::from));
    }
    out.join("\n")
}

/// Summary entries first, then file chunks, each labelled.
pub fn build_context(results: &[RetrievedResult]) -> String {
    let summaries = results
        .iter()
        .filter(|r| r.metadata.summary)
        .map(|r| format!("[REPOSITORY SUMMARY]\n{}", r.content));
    let files = results
        .iter()
        .filter(|r| !r.metadata.summary)
        .map(|r| format!("[FILE: {}]\n{}", r.metadata.path, r.content));
    summaries.chain(files).collect::<Vec<_>>().join("\n\n")
}

fn explanation_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an expert assistant answering questions about a code repository.

Rules:
- Use ONLY the repository context provided.
- Ground all claims in the context.
- Do NOT hallucinate missing information.
- If the repository does not contain enough information, say so clearly.

Repository Context:
{context}

Question:
{question}

Answer clearly and concisely.
"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::make_chunk;
    use crate::embedding::HashingEmbedder;
    use crate::generate::testing::Scripted;
    use crate::models::{ChunkKind, ChunkRole, EmbeddedChunk, Language, Origin};
    use crate::retrieve::RetrievalParams;
    use crate::router::EmbeddingRouter;
    use crate::store::memory::InMemoryStore;

    fn repo(name: &str) -> RepoId {
        RepoId::parse(&format!("https://github.com/acme/{}", name)).unwrap()
    }

    fn result(path: &str, kind: ChunkKind, summary: bool) -> RetrievedResult {
        let chunk = make_chunk(
            &repo("a"),
            path,
            0,
            Language::detect(path),
            kind,
            if summary { ChunkRole::Summary } else { ChunkRole::File },
            format!("content of {}", path),
        );
        RetrievedResult {
            similarity: 0.5,
            content: chunk.content.clone(),
            metadata: chunk.metadata(),
            origin: Origin::from(kind),
        }
    }

    async fn engine_with(
        files: &[(&str, ChunkKind, &str)],
        generator: Arc<Scripted>,
    ) -> (QaEngine, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let embedder = HashingEmbedder::new(64);
        let a = repo("a");
        for (path, kind, content) in files {
            let chunk = make_chunk(&a, path, 0, Language::detect(path), *kind, ChunkRole::File, content.to_string());
            let vector = embedder.embed_one(content);
            store.add(*kind, &[EmbeddedChunk { chunk, vector }]).await.unwrap();
        }
        store.mark_ingested(&a, "v1").await.unwrap();

        let router = EmbeddingRouter::new(
            Arc::new(HashingEmbedder::new(64)),
            Arc::new(HashingEmbedder::new(64)),
        );
        let retriever = Retriever::new(store.clone(), router, RetrievalParams::default());
        (QaEngine::new(retriever, generator, 12), store)
    }

    #[test]
    fn test_mode_detection() {
        assert_eq!(QuestionMode::detect("Which files handle auth?"), QuestionMode::Inventory);
        assert_eq!(QuestionMode::detect("How is caching implemented?"), QuestionMode::Inventory);
        assert_eq!(QuestionMode::detect("How is the project structured?"), QuestionMode::Structure);
        assert_eq!(QuestionMode::detect("Show me the folders"), QuestionMode::Structure);
        assert_eq!(QuestionMode::detect("How does login work?"), QuestionMode::Explanation);
    }

    #[test]
    fn test_repo_intent() {
        assert!(is_repo_intent("What is this repository for?"));
        assert!(is_repo_intent("what does this repo do"));
        assert!(!is_repo_intent("what does parse() do"));
    }

    #[test]
    fn test_structure_answer_format() {
        let results = vec![
            result("src/app.py", ChunkKind::Code, false),
            result("README.md", ChunkKind::Text, false),
            result("src/app.py", ChunkKind::Code, false),
            result("(repository summary)", ChunkKind::Text, true),
        ];
        let text = structure_answer(&results);
        assert_eq!(
            text,
            "Repository Structure (from indexed files):\n\nDirectories:\n- ./\n- src\n\nFiles:\n- README.md\n- src/app.py\n\nLanguages:\n- markdown\n- python"
        );
    }

    #[test]
    fn test_inventory_answer() {
        let results = vec![
            result("lib/algo.rs", ChunkKind::Code, false),
            result("(repository summary)", ChunkKind::Text, true),
        ];
        let text = inventory_answer(&results);
        assert!(text.starts_with("Inventory of explicit artifacts found:"));
        assert!(text.contains("\nFiles:\n- lib/algo.rs"));
        assert!(text.contains("\nTypes:\n- code\n- repo_summary"));
        assert!(text.contains("\nLanguages:\n- rust"));

        assert_eq!(inventory_answer(&[]), NO_INVENTORY);
        assert_eq!(structure_answer(&[]), NO_INVENTORY);
    }

    #[test]
    fn test_context_puts_summary_first() {
        let results = vec![
            result("src/app.py", ChunkKind::Code, false),
            result("(repository summary)", ChunkKind::Text, true),
        ];
        let ctx = build_context(&results);
        assert!(ctx.starts_with("[REPOSITORY SUMMARY]\n"));
        assert!(ctx.contains("\n\n[FILE: src/app.py]\ncontent of src/app.py"));
    }

    #[tokio::test]
    async fn test_never_ingested_repository_is_not_ready() {
        let generator = Arc::new(Scripted::new(&["should not be used"]));
        let (engine, _) = engine_with(&[], generator.clone()).await;

        let other = repo("never-ingested");
        let err = engine.answer(&other, "How does it work?", None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitSageError>(),
            Some(GitSageError::RepositoryNotReady { .. })
        ));
        assert_eq!(generator.prompt_count(), 0);

        // Retrieval on its own just comes back empty.
        let results = engine.retriever.retrieve("How does it work?", 5, Some(&other)).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_version_is_not_ready() {
        let (engine, _) = engine_with(&[], Arc::new(Scripted::new(&[]))).await;
        assert!(engine.answer(&repo("a"), "anything", Some("v9")).await.is_err());
        assert!(engine.answer(&repo("a"), "anything", Some("v1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_structural_questions_skip_generator() {
        let generator = Arc::new(Scripted::new(&["unused"]));
        let (engine, _) = engine_with(
            &[("src/db/pool.rs", ChunkKind::Code, "fn open_pool() -> Pool { connect the database pool }")],
            generator.clone(),
        )
        .await;

        let answer = engine.answer(&repo("a"), "Which files open the database pool?", None).await.unwrap();
        assert_eq!(answer.mode, QuestionMode::Inventory);
        assert!(answer.text.contains("src/db/pool.rs"));
        assert_eq!(generator.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_explanation_uses_generator_with_context() {
        let generator = Arc::new(Scripted::new(&["It opens a pooled connection."]));
        let (engine, _) = engine_with(
            &[("src/db/pool.rs", ChunkKind::Code, "fn open_pool() -> Pool { connect the database pool }")],
            generator.clone(),
        )
        .await;

        let answer = engine.answer(&repo("a"), "How does the database pool work?", None).await.unwrap();
        assert_eq!(answer.mode, QuestionMode::Explanation);
        assert_eq!(answer.text, "It opens a pooled connection.");
        assert_eq!(answer.sources, vec!["src/db/pool.rs".to_string()]);
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("[FILE: src/db/pool.rs]"));
        assert!(prompts[0].contains("Question:\nHow does the database pool work?"));
    }

    #[tokio::test]
    async fn test_explanation_with_nothing_retrieved() {
        let generator = Arc::new(Scripted::new(&["unused"]));
        let (engine, _) = engine_with(&[], generator.clone()).await;
        let answer = engine.answer(&repo("a"), "How does login work?", None).await.unwrap();
        assert_eq!(answer.text, NO_ANSWER);
        assert_eq!(generator.prompt_count(), 0);
    }
}
