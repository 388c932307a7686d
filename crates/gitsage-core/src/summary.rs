//! Repository summary builder.
//!
//! Produces one curated summary chunk per repository from the accepted file
//! list: languages from file extensions and dependencies from
//! `package.json`, `requirements.txt` and `Cargo.toml` manifests. The chunk
//! is stored in the text collection with [`ChunkRole::Summary`], which the
//! retriever boosts for broad "what is this repository" questions.

use std::collections::HashMap;

use crate::chunk::make_chunk;
use crate::models::{Chunk, ChunkKind, ChunkRole, Language, RepoId};

/// Path recorded for the summary chunk.
pub const SUMMARY_PATH: &str = "(repository summary)";

const MAX_DEPENDENCIES: usize = 20;

/// Accumulates facts about accepted files, then renders the summary chunk.
#[derive(Debug, Default)]
pub struct SummaryBuilder {
    languages: HashMap<Language, usize>,
    dependencies: Vec<String>,
}

impl SummaryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one accepted file.
    pub fn observe(&mut self, path: &str, content: &str) {
        let language = Language::detect(path);
        if language != Language::Text {
            *self.languages.entry(language).or_default() += 1;
        }

        let name = path.rsplit('/').next().unwrap_or(path);
        let found = match name {
            "package.json" => npm_dependencies(content),
            "requirements.txt" => pip_requirements(content),
            "Cargo.toml" => cargo_dependencies(content),
            _ => return,
        };
        for dep in found {
            if !self.dependencies.contains(&dep) {
                self.dependencies.push(dep);
            }
        }
    }

    /// Render the summary text, or `None` when nothing was observed.
    pub fn render(&self) -> Option<String> {
        if self.languages.is_empty() && self.dependencies.is_empty() {
            return None;
        }

        let mut languages: Vec<(Language, usize)> =
            self.languages.iter().map(|(l, n)| (*l, *n)).collect();
        languages.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        let languages: Vec<&str> = languages.iter().map(|(l, _)| l.as_str()).collect();

        let deps: Vec<&str> = self
            .dependencies
            .iter()
            .take(MAX_DEPENDENCIES)
            .map(String::as_str)
            .collect();

        Some(format!(
            "Repository summary (from file types and manifests):\nLanguages: {}\nDependencies: {}",
            or_none(&languages),
            or_none(&deps),
        ))
    }

    pub fn build(&self, repo: &RepoId) -> Option<Chunk> {
        let content = self.render()?;
        Some(make_chunk(
            repo,
            SUMMARY_PATH,
            0,
            Language::Text,
            ChunkKind::Text,
            ChunkRole::Summary,
            content,
        ))
    }
}

fn or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "none detected".to_string()
    } else {
        items.join(", ")
    }
}

fn npm_dependencies(content: &str) -> Vec<String> {
    let json: serde_json::Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable package.json");
            return Vec::new();
        }
    };
    ["dependencies", "devDependencies", "peerDependencies"]
        .iter()
        .filter_map(|section| json.get(section).and_then(|s| s.as_object()))
        .flat_map(|deps| deps.keys().cloned())
        .collect()
}

fn pip_requirements(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|l| l.split('#').next().unwrap_or("").trim())
        .filter(|l| !l.is_empty() && !l.starts_with('-'))
        .filter_map(|l| {
            let end = l
                .find(|c: char| matches!(c, '=' | '>' | '<' | '~' | '!' | '[' | ';' | ' '))
                .unwrap_or(l.len());
            let name = l[..end].trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

fn cargo_dependencies(content: &str) -> Vec<String> {
    let doc: toml::Value = match toml::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable Cargo.toml");
            return Vec::new();
        }
    };
    let workspace = doc.get("workspace").and_then(|w| w.get("dependencies"));
    ["dependencies", "dev-dependencies", "build-dependencies"]
        .iter()
        .filter_map(|section| doc.get(section))
        .chain(workspace)
        .filter_map(|t| t.as_table())
        .flat_map(|t| t.keys().cloned())
        .collect()
}
