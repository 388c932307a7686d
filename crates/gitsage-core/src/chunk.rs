//! Language-aware chunker.
//!
//! Splits one file's validated content into [`Chunk`]s. The strategy is
//! chosen by [`Language::strategy`]:
//!
//! | Strategy | Languages | Kind |
//! |----------|-----------|------|
//! | [`Strategy::Headings`] | Markdown | `text` |
//! | [`Strategy::Declarations`] | Python, JS, TS, Java, C, C++, Go, Rust | `code` |
//! | [`Strategy::Lines`] | YAML, JSON, TOML, INI, env, plain text | `text` |
//!
//! Chunks never span two files. Every chunk receives a deterministic UUIDv5
//! derived from `"{repo}/{path}#{index}"`, so re-ingesting a repository
//! produces the same ids and the store upserts instead of duplicating.
//!
//! # Example
//!
//! ```rust
//! use gitsage_core::chunk::{chunk_file, ChunkingParams};
//! use gitsage_core::models::{ChunkKind, RepoId};
//!
//! let repo = RepoId::parse("https://github.com/acme/widgets").unwrap();
//! let src = "import os\n\ndef a():\n    return 1\n\ndef b():\n    return 2\n";
//! let chunks = chunk_file(&repo, "app.py", src, &ChunkingParams::default());
//! assert_eq!(chunks.len(), 3);
//! assert!(chunks.iter().all(|c| c.kind == ChunkKind::Code));
//! ```

use std::sync::OnceLock;

use regex::Regex;
use uuid::Uuid;

use crate::models::{Chunk, ChunkKind, ChunkRole, Language, RepoId};

/// A flushed line window with at most this many lines only carries the
/// short overlap into the next window.
const SHORT_WINDOW_LINES: usize = 5;

/// How a file's content is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Split before every Markdown heading line.
    Headings,
    /// Split before every top-level declaration.
    Declarations,
    /// Fixed-size line windows with overlap.
    Lines,
}

impl Strategy {
    /// Headings and line windows describe prose or configuration; declarations are code.
    pub fn kind(self) -> ChunkKind {
        match self {
            Strategy::Declarations => ChunkKind::Code,
            Strategy::Headings | Strategy::Lines => ChunkKind::Text,
        }
    }
}

impl Language {
    pub fn strategy(self) -> Strategy {
        match self {
            Language::Markdown => Strategy::Headings,
            Language::Python
            | Language::JavaScript
            | Language::TypeScript
            | Language::Java
            | Language::C
            | Language::Cpp
            | Language::Go
            | Language::Rust => Strategy::Declarations,
            Language::Yaml
            | Language::Json
            | Language::Toml
            | Language::Ini
            | Language::Env
            | Language::Text => Strategy::Lines,
        }
    }
}

/// Tuning for the [`Strategy::Lines`] windows.
#[derive(Debug, Clone)]
pub struct ChunkingParams {
    /// A window is flushed once its content reaches this many characters.
    pub max_chars: usize,
    /// Lines carried into the next window after a long flush.
    pub overlap_lines: usize,
    /// Lines carried after flushing a window of five lines or fewer.
    pub short_overlap_lines: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            max_chars: 1500,
            overlap_lines: 7,
            short_overlap_lines: 2,
        }
    }
}

/// Split one file into chunks. Empty or whitespace-only content yields none.
pub fn chunk_file(
    repo: &RepoId,
    path: &str,
    content: &str,
    params: &ChunkingParams,
) -> Vec<Chunk> {
    if content.trim().is_empty() {
        return Vec::new();
    }

    let language = Language::detect(path);
    let strategy = language.strategy();
    let pieces = match strategy {
        Strategy::Headings => split_headings(content),
        Strategy::Declarations => split_declarations(content, language),
        Strategy::Lines => split_lines(content, params),
    };

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| {
            make_chunk(
                repo,
                path,
                index,
                language,
                strategy.kind(),
                ChunkRole::File,
                text,
            )
        })
        .collect()
}

/// Build a [`Chunk`] with its deterministic id.
pub fn make_chunk(
    repo: &RepoId,
    path: &str,
    index: usize,
    language: Language,
    kind: ChunkKind,
    role: ChunkRole,
    content: String,
) -> Chunk {
    Chunk {
        id: chunk_id(repo, path, index),
        repo: repo.clone(),
        path: path.to_string(),
        index,
        language,
        kind,
        role,
        size: content.chars().count(),
        content,
    }
}

pub fn chunk_id(repo: &RepoId, path: &str, index: usize) -> String {
    let name = format!("{}/{}#{}", repo, path, index);
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// Cut `text` at the given byte offsets (each the start of a line).
fn cut_at(text: &str, mut bounds: Vec<usize>) -> Vec<&str> {
    bounds.retain(|&b| b > 0 && b < text.len());
    bounds.sort_unstable();
    bounds.dedup();

    let mut pieces = Vec::with_capacity(bounds.len() + 1);
    let mut start = 0;
    for b in bounds {
        pieces.push(&text[start..b]);
        start = b;
    }
    pieces.push(&text[start..]);
    pieces
}

fn line_start(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map(|p| p + 1).unwrap_or(0)
}

fn split_headings(text: &str) -> Vec<String> {
    let mut bounds = Vec::new();
    let mut in_fence = false;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
        } else if !in_fence && line.starts_with('#') {
            bounds.push(offset);
        }
        offset += line.len();
    }

    cut_at(text, bounds)
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .map(str::to_string)
        .collect()
}

fn split_declarations(text: &str, language: Language) -> Vec<String> {
    let bounds = declaration_patterns(language)
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| line_start(text, m.start())))
        .collect();

    cut_at(text, bounds)
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_lines(text: &str, params: &ChunkingParams) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: Vec<&str> = Vec::new();
    let mut window_chars = 0usize;
    // Lines in the window that were not carried over from the previous flush.
    let mut fresh = 0usize;

    for line in text.lines() {
        window.push(line);
        window_chars += line.chars().count();
        fresh += 1;

        if window_chars >= params.max_chars {
            chunks.push(window.join("\n"));
            let keep = if window.len() > SHORT_WINDOW_LINES {
                params.overlap_lines
            } else {
                params.short_overlap_lines
            };
            let keep = keep.min(window.len() - 1);
            window.drain(..window.len() - keep);
            window_chars = window.iter().map(|l| l.chars().count()).sum();
            // Overlap is capped at half the budget so each window is mostly new lines.
            while window_chars * 2 > params.max_chars && !window.is_empty() {
                let dropped = window.remove(0);
                window_chars -= dropped.chars().count();
            }
            fresh = 0;
        }
    }

    if fresh > 0 {
        chunks.push(window.join("\n"));
    }

    chunks.retain(|c| !c.trim().is_empty());
    chunks
}

fn declaration_patterns(language: Language) -> &'static [Regex] {
    static PYTHON: OnceLock<Vec<Regex>> = OnceLock::new();
    static SCRIPT: OnceLock<Vec<Regex>> = OnceLock::new();
    static JAVA: OnceLock<Vec<Regex>> = OnceLock::new();
    static C_FAMILY: OnceLock<Vec<Regex>> = OnceLock::new();
    static GO: OnceLock<Vec<Regex>> = OnceLock::new();
    static RUST: OnceLock<Vec<Regex>> = OnceLock::new();

    let (cell, sources): (&OnceLock<Vec<Regex>>, &[&str]) = match language {
        Language::Python => (&PYTHON, &[r"(?m)^(?:class|def)\s+"]),
        Language::JavaScript | Language::TypeScript => (
            &SCRIPT,
            &[r"function\s+\w+", r"const\s+\w+\s*=\s*\(", r"class\s+\w+"],
        ),
        Language::Java => (
            &JAVA,
            &[r"(?m)^(?:(?:public|protected|private|abstract|final|static|sealed)\s+)*(?:class|interface|enum|record)\s+\w+"],
        ),
        Language::C | Language::Cpp => (
            &C_FAMILY,
            &[
                r"(?m)^(?:class|struct|namespace)\s+\w+",
                r"(?m)^[A-Za-z_][\w \t\*&:<>,]*?[ \t\*&]+[A-Za-z_][\w:~]*[ \t]*\([^;\n]*$",
            ],
        ),
        Language::Go => (&GO, &[r"(?m)^(?:func|type)\s+"]),
        Language::Rust => (
            &RUST,
            &[r"(?m)^(?:pub(?:\([^)\n]*\))?\s+)?(?:(?:async|unsafe|const|extern)\s+)*(?:fn|struct|enum|trait|impl|mod)\b"],
        ),
        _ => return &[],
    };

    cell.get_or_init(|| {
        sources
            .iter()
            .filter_map(|src| match Regex::new(src) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::error!(pattern = %src, error = %e, "invalid declaration pattern");
                    None
                }
            })
            .collect()
    })
}
