//! File filter and content validator.
//!
//! Two pure predicate stages decide which repository files are worth
//! chunking and embedding:
//!
//! 1. [`FileFilter::check_entry`] runs on the tree listing (path + size),
//!    before anything is read.
//! 2. [`FileFilter::validate_content`] runs on the raw bytes once a file has
//!    been read.
//!
//! A rejection is a filtering decision, not an error: both stages return a
//! [`Rejection`] value that the pipeline logs and skips.

use std::fmt;

/// Directory names that never contain indexable source.
const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    ".github",
    "__pycache__",
    "venv",
    "env",
    "dist",
    "build",
    "target",
    ".vscode",
    ".idea",
    ".mvn",
    ".gradle",
    "bower_components",
];

/// Binary media, archives, compiled artifacts, fonts, secrets, lock and database files.
const BLOCKED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "svg", "mp4", "mov", "mp3", "pdf", "zip", "tar", "gz",
    "7z", "exe", "bin", "dll", "pyc", "o", "so", "ttf", "woff", "woff2", "lock", "db", "sqlite",
    "p12", "pem", "crt", "key",
];

const DOC_NAME_HINTS: &[&str] = &["readme", "architecture", "contributing"];
const CONFIG_EXTENSIONS: &[&str] = &["yaml", "yml", "toml", "json"];

/// Share of control characters above which content is treated as binary.
const BINARY_RATIO: f64 = 0.3;
const MINIFIED_AVG_LINE: usize = 300;
const MINIFIED_FEW_LINES: usize = 3;
const MINIFIED_FEW_LINES_CHARS: usize = 1000;
const MIN_CONTENT_CHARS: usize = 50;

/// Why a file was excluded from ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    IgnoredDirectory(String),
    BlockedExtension(String),
    SecretFile,
    TooLarge { size: u64, limit: u64 },
    NotUtf8,
    Binary,
    Minified,
    TooSmall,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::IgnoredDirectory(dir) => write!(f, "inside ignored directory '{}'", dir),
            Rejection::BlockedExtension(ext) => write!(f, "blocked extension '.{}'", ext),
            Rejection::SecretFile => write!(f, "environment secret file"),
            Rejection::TooLarge { size, limit } => {
                write!(f, "too large ({} bytes, limit {})", size, limit)
            }
            Rejection::NotUtf8 => write!(f, "not valid UTF-8"),
            Rejection::Binary => write!(f, "binary content"),
            Rejection::Minified => write!(f, "minified content"),
            Rejection::TooSmall => write!(f, "too little content"),
        }
    }
}

/// Size ceilings, in bytes, per file category.
#[derive(Debug, Clone)]
pub struct FilterLimits {
    /// README / ARCHITECTURE / CONTRIBUTING style documents.
    pub max_doc_bytes: u64,
    /// YAML, TOML and JSON files.
    pub max_config_bytes: u64,
    /// Everything else.
    pub max_file_bytes: u64,
}

impl Default for FilterLimits {
    fn default() -> Self {
        Self {
            max_doc_bytes: 2_000_000,
            max_config_bytes: 500_000,
            max_file_bytes: 300_000,
        }
    }
}

/// Inclusion policy for candidate files.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    limits: FilterLimits,
}

impl FileFilter {
    pub fn new(limits: FilterLimits) -> Self {
        Self { limits }
    }

    /// Decide from the tree listing alone whether a file is worth downloading.
    pub fn check_entry(&self, path: &str, size: u64) -> Result<(), Rejection> {
        let lower = path.to_lowercase();
        let parts: Vec<&str> = lower.split('/').filter(|p| !p.is_empty()).collect();
        let filename = parts.last().copied().unwrap_or("");

        if let Some(dir) = parts
            .iter()
            .take(parts.len().saturating_sub(1))
            .find(|p| IGNORED_DIRS.contains(p))
        {
            return Err(Rejection::IgnoredDirectory(dir.to_string()));
        }

        if filename.ends_with(".mv.db") {
            return Err(Rejection::BlockedExtension("mv.db".to_string()));
        }
        let ext = extension(filename);
        if BLOCKED_EXTENSIONS.contains(&ext) {
            return Err(Rejection::BlockedExtension(ext.to_string()));
        }

        if filename.starts_with(".env") {
            return Err(Rejection::SecretFile);
        }

        let limit = if DOC_NAME_HINTS.iter().any(|h| filename.contains(h)) {
            self.limits.max_doc_bytes
        } else if CONFIG_EXTENSIONS.contains(&ext) {
            self.limits.max_config_bytes
        } else {
            self.limits.max_file_bytes
        };
        if size >= limit {
            return Err(Rejection::TooLarge { size, limit });
        }

        Ok(())
    }

    /// Validate downloaded bytes and return them as normalized text.
    ///
    /// Line endings are normalized to `\n` in the returned string.
    pub fn validate_content(&self, bytes: &[u8]) -> Result<String, Rejection> {
        let text = std::str::from_utf8(bytes).map_err(|_| Rejection::NotUtf8)?;

        if is_binary(text) {
            return Err(Rejection::Binary);
        }
        if is_minified(text) {
            return Err(Rejection::Minified);
        }
        if text.trim().chars().count() < MIN_CONTENT_CHARS {
            return Err(Rejection::TooSmall);
        }

        Ok(text.replace("\r\n", "\n"))
    }
}

fn extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(0) | None => "",
        Some(pos) => &filename[pos + 1..],
    }
}

/// Empty content, or content where control characters dominate.
pub fn is_binary(text: &str) -> bool {
    let mut total = 0usize;
    let mut suspicious = 0usize;
    for c in text.chars() {
        total += 1;
        let control = c.is_control() && !matches!(c, '\t' | '\n' | '\r');
        if control || c == char::REPLACEMENT_CHARACTER {
            suspicious += 1;
        }
    }
    if total == 0 {
        return true;
    }
    suspicious as f64 / total as f64 > BINARY_RATIO
}

/// Few very long lines: bundled or minified output.
pub fn is_minified(text: &str) -> bool {
    let lines: Vec<&str> = text.lines().collect();
    let chars = text.chars().count();
    if lines.len() < MINIFIED_FEW_LINES && chars > MINIFIED_FEW_LINES_CHARS {
        return true;
    }
    let total: usize = lines.iter().map(|l| l.chars().count()).sum();
    let avg = total / lines.len().max(1);
    avg > MINIFIED_AVG_LINE
}
