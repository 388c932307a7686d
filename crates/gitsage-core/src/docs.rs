//! Documentation generator.
//!
//! Builds a fixed set of documentation sections for one repository. Each
//! section retrieves context with a handful of queries, drops duplicate
//! chunks, and asks the generator to write the section from that context
//! plus the repository summary.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::generate::{generate_or_default, Generator};
use crate::models::{RepoId, RetrievedResult};
use crate::qa::ensure_ready;
use crate::retrieve::Retriever;

/// File chunks handed to the generator per section.
const CONTEXT_CHUNKS: usize = 2;

const NO_DEPENDENCIES: &str = "No dependency information available.";

struct SectionPlan {
    key: &'static str,
    title: &'static str,
    queries: &'static [&'static str],
    top_k: usize,
    instructions: &'static str,
}

const SECTIONS: &[SectionPlan] = &[
    SectionPlan {
        key: "overview",
        title: "Overview",
        queries: &[
            "What is the main purpose of this repository?",
            "What does this project do?",
        ],
        top_k: 3,
        instructions: "Based on the code and files provided, write a concise overview of this repository.
Include:
- What the project does
- Main purpose/goal
- Target users or use case

Keep it 2-3 paragraphs maximum.",
    },
    SectionPlan {
        key: "architecture",
        title: "Architecture",
        queries: &[
            "How is the codebase structured?",
            "What are the main modules and components?",
            "What design patterns are used?",
        ],
        top_k: 4,
        instructions: "Describe the architecture and structure of this codebase.
Include:
- Main directories/modules and their purposes
- How components interact
- Design patterns or architectural style used
- Technology stack

Keep it clear and organized.",
    },
    SectionPlan {
        key: "setup",
        title: "Getting Started",
        queries: &[
            "How do I set up this project?",
            "What are the installation steps?",
            "How do I run this project?",
        ],
        top_k: 3,
        instructions: "Write clear setup and installation instructions for this project.
Include:
- Prerequisites (languages, tools, dependencies)
- Installation steps
- How to run the project
- Any configuration needed

Format as a numbered step-by-step guide.",
    },
    SectionPlan {
        key: "features",
        title: "Key Features",
        queries: &[
            "What are the main features of this project?",
            "What functionality does this provide?",
        ],
        top_k: 4,
        instructions: "List and describe the main features and functionality of this project.
Be specific about what users can do with this software.
Format as bullet points or numbered list.",
    },
    SectionPlan {
        key: "api_reference",
        title: "API Reference",
        queries: &[
            "What are the main functions and classes?",
            "What are the key API endpoints or methods?",
        ],
        top_k: 5,
        instructions: "Document the main functions, classes, or API endpoints in this codebase.
Include:
- Function/class names
- What they do
- Key parameters or inputs
- Return values or outputs

Focus on the most important components.",
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct DocSection {
    pub key: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Documentation {
    pub repo: RepoId,
    pub sections: Vec<DocSection>,
}

impl Documentation {
    pub fn to_markdown(&self) -> String {
        let mut out = vec!["# Repository Documentation\n".to_string()];
        for s in &self.sections {
            out.push(format!("## {}\n", s.title));
            out.push(s.body.clone());
            out.push("\n".to_string());
        }
        out.push("---\n".to_string());
        out.push("*Documentation generated automatically by GitSage*\n".to_string());
        out.join("\n")
    }
}

pub struct DocsGenerator {
    retriever: Retriever,
    generator: Arc<dyn Generator>,
}

impl DocsGenerator {
    pub fn new(retriever: Retriever, generator: Arc<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    pub async fn generate(&self, repo: &RepoId) -> Result<Documentation> {
        ensure_ready(self.retriever.store().as_ref(), repo, None).await?;

        let summary = self.repository_summary(repo).await?;
        let mut sections = Vec::with_capacity(SECTIONS.len() + 1);

        for plan in SECTIONS {
            tracing::info!(repo = %repo, section = plan.key, "generating section");
            let chunks = self.collect(repo, plan).await?;
            let prompt = section_prompt(plan.instructions, &chunks, summary.as_deref());
            let body = generate_or_default(self.generator.as_ref(), &prompt).await?;
            sections.push(DocSection {
                key: plan.key.to_string(),
                title: plan.title.to_string(),
                body,
            });

            if plan.key == "features" {
                sections.push(self.dependencies_section(summary.as_deref()).await?);
            }
        }

        Ok(Documentation {
            repo: repo.clone(),
            sections,
        })
    }

    async fn repository_summary(&self, repo: &RepoId) -> Result<Option<String>> {
        let hits = self
            .retriever
            .retrieve("repository summary languages dependencies", 3, Some(repo))
            .await?;
        Ok(hits
            .into_iter()
            .find(|r| r.metadata.summary)
            .map(|r| r.content))
    }

    async fn collect(&self, repo: &RepoId, plan: &SectionPlan) -> Result<Vec<RetrievedResult>> {
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        for query in plan.queries {
            for r in self.retriever.retrieve(query, plan.top_k, Some(repo)).await? {
                if r.metadata.summary {
                    continue;
                }
                if seen.insert(r.content.clone()) {
                    unique.push(r);
                }
            }
        }
        unique.truncate(CONTEXT_CHUNKS);
        Ok(unique)
    }

    async fn dependencies_section(&self, summary: Option<&str>) -> Result<DocSection> {
        let body = match summary {
            Some(s) => {
                let prompt = format!(
                    "Based on the repository summary and code, describe the main dependencies and libraries used.

Repository Summary:
{s}

Explain what each major dependency is used for."
                );
                generate_or_default(self.generator.as_ref(), &prompt).await?
            }
            None => NO_DEPENDENCIES.to_string(),
        };
        Ok(DocSection {
            key: "dependencies".to_string(),
            title: "Dependencies".to_string(),
            body,
        })
    }
}

fn section_prompt(instructions: &str, chunks: &[RetrievedResult], summary: Option<&str>) -> String {
    let mut context = Vec::new();
    if let Some(s) = summary {
        context.push(format!("[REPOSITORY SUMMARY]\n{}", s));
    }
    for c in chunks {
        context.push(format!("[FILE: {}]\n{}", c.metadata.path, c.content));
    }
    format!(
        "{}\n\nUse ONLY the repository context below. Do NOT invent details it does not contain.\n\nRepository Context:\n{}\n",
        instructions,
        context.join("\n\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_file, ChunkingParams};
    use crate::embedding::HashingEmbedder;
    use crate::error::GitSageError;
    use crate::generate::testing::Scripted;
    use crate::generate::NO_ANSWER;
    use crate::models::ChunkKind;
    use crate::retrieve::RetrievalParams;
    use crate::router::EmbeddingRouter;
    use crate::store::memory::InMemoryStore;
    use crate::store::VectorStore;
    use crate::summary::SummaryBuilder;

    async fn seeded(repo: &RepoId) -> Retriever {
        let store = Arc::new(InMemoryStore::new());
        let router = EmbeddingRouter::new(
            Arc::new(HashingEmbedder::new(64)),
            Arc::new(HashingEmbedder::new(64)),
        );
        let files = [
            ("README.md", "# Widgets\nInstall with make install.\n\n## Usage\nRun widgets serve.\n"),
            ("src/main.py", "def serve():\n    pass\n\ndef install():\n    pass\n"),
        ];
        let mut chunks = Vec::new();
        let mut summary = SummaryBuilder::new();
        for (path, content) in files {
            summary.observe(path, content);
            chunks.extend(chunk_file(repo, path, content, &ChunkingParams::default()));
        }
        chunks.extend(summary.build(repo));

        let embedded = router.route_and_embed(chunks).await.unwrap();
        for kind in ChunkKind::ALL {
            let batch: Vec<_> = embedded.iter().filter(|e| e.chunk.kind == kind).cloned().collect();
            store.add(kind, &batch).await.unwrap();
        }
        store.mark_ingested(repo, "v1").await.unwrap();
        Retriever::new(store, router, RetrievalParams::default())
    }

    #[tokio::test]
    async fn test_generates_all_sections_in_order() {
        let repo = RepoId::parse("https://github.com/acme/widgets").unwrap();
        let generator = Arc::new(Scripted::new(&[]));
        let docs = DocsGenerator::new(seeded(&repo).await, generator.clone())
            .generate(&repo)
            .await
            .unwrap();

        let keys: Vec<&str> = docs.sections.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["overview", "architecture", "setup", "features", "dependencies", "api_reference"]
        );
        // The scripted generator returns nothing, so every section falls back.
        assert!(docs.sections.iter().all(|s| s.body == NO_ANSWER));
        assert_eq!(generator.prompt_count(), 6);

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("[REPOSITORY SUMMARY]\nRepository summary"));
        assert!(prompts[0].matches("[FILE: ").count() <= CONTEXT_CHUNKS);
    }

    #[test]
    fn test_markdown_rendering() {
        let repo = RepoId::parse("https://github.com/acme/widgets").unwrap();
        let docs = Documentation {
            repo,
            sections: vec![DocSection {
                key: "overview".into(),
                title: "Overview".into(),
                body: "A widget server.".into(),
            }],
        };
        let md = docs.to_markdown();
        assert!(md.starts_with("# Repository Documentation\n"));
        assert!(md.contains("## Overview\n\nA widget server."));
        assert!(md.ends_with("*Documentation generated automatically by GitSage*\n"));
    }

    #[tokio::test]
    async fn test_requires_ingested_repository() {
        let repo = RepoId::parse("https://github.com/acme/widgets").unwrap();
        let other = RepoId::parse("https://github.com/acme/missing").unwrap();
        let err = DocsGenerator::new(seeded(&repo).await, Arc::new(Scripted::new(&[])))
            .generate(&other)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitSageError>(),
            Some(GitSageError::RepositoryNotReady { .. })
        ));
    }
}
