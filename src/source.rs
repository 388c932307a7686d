//! Repository sources.
//!
//! Two [`RepositorySource`] adapters:
//!
//! - [`LocalSource`] walks a directory on disk. Its content version is a
//!   SHA-256 digest of the sorted `(path, size, mtime)` listing, unless an
//!   explicit version is given.
//! - [`GitSource`] clones (or updates) a remote repository into the cache
//!   directory and walks the checkout. Its content version is the HEAD commit.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

use gitsage_core::ingest::{FileEntry, RepositorySource};

use crate::config::SourcesConfig;

/// True if `target` names a remote git repository rather than a local path.
pub fn is_remote(target: &str) -> bool {
    ["http://", "https://", "ssh://", "git://", "git@"]
        .iter()
        .any(|p| target.starts_with(p))
}

/// A directory on the local filesystem.
pub struct LocalSource {
    root: PathBuf,
    excludes: GlobSet,
    follow_symlinks: bool,
    version: Option<String>,
}

impl LocalSource {
    pub fn new(root: &Path, config: &SourcesConfig) -> Result<Self> {
        if !root.is_dir() {
            bail!("Repository root does not exist or is not a directory: {}", root.display());
        }

        let mut excludes = vec!["**/.git/**".to_string()];
        excludes.extend(config.exclude_globs.clone());

        Ok(Self {
            root: root.to_path_buf(),
            excludes: build_globset(&excludes)?,
            follow_symlinks: config.follow_symlinks,
            version: None,
        })
    }

    /// Use `version` instead of the listing digest.
    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(&self) -> Result<Vec<(FileEntry, i64)>> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(self.follow_symlinks) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().replace('\\', "/");

            if self.excludes.is_match(&rel_str) {
                continue;
            }

            let metadata = entry.metadata()?;
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            entries.push((
                FileEntry {
                    path: rel_str,
                    size: metadata.len(),
                },
                mtime,
            ));
        }

        // Sort for deterministic ordering
        entries.sort_by(|a, b| a.0.path.cmp(&b.0.path));
        Ok(entries)
    }
}

#[async_trait]
impl RepositorySource for LocalSource {
    async fn list_files(&self) -> Result<Vec<FileEntry>> {
        Ok(self.walk()?.into_iter().map(|(e, _)| e).collect())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.root.join(path);
        tokio::fs::read(&full)
            .await
            .with_context(|| format!("Failed to read {}", full.display()))
    }

    async fn content_version(&self) -> Result<Option<String>> {
        if let Some(v) = &self.version {
            return Ok(Some(v.clone()));
        }

        let mut hasher = Sha256::new();
        for (entry, mtime) in self.walk()? {
            hasher.update(entry.path.as_bytes());
            hasher.update([0]);
            hasher.update(entry.size.to_le_bytes());
            hasher.update(mtime.to_le_bytes());
            hasher.update(b"\n");
        }
        Ok(Some(format!("sha256:{:x}", hasher.finalize())))
    }
}

/// A remote git repository, materialized under the sources cache directory.
pub struct GitSource {
    checkout: LocalSource,
    head: String,
}

impl GitSource {
    /// Clone `url` into the cache (or update an existing clone) and resolve HEAD.
    pub fn fetch(url: &str, config: &SourcesConfig) -> Result<Self> {
        let dest = config.cache_dir.join(short_hash(url));

        if dest.join(".git").exists() {
            tracing::info!(%url, dir = %dest.display(), "updating cached clone");
            git_pull(&dest, config.shallow)?;
        } else {
            tracing::info!(%url, dir = %dest.display(), "cloning repository");
            git_clone(url, config.shallow, &dest)?;
        }

        let head = git_head_sha(&dest)?;
        Ok(Self {
            checkout: LocalSource::new(&dest, config)?,
            head,
        })
    }

    pub fn head(&self) -> &str {
        &self.head
    }
}

#[async_trait]
impl RepositorySource for GitSource {
    async fn list_files(&self) -> Result<Vec<FileEntry>> {
        self.checkout.list_files().await
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        self.checkout.read_file(path).await
    }

    async fn content_version(&self) -> Result<Option<String>> {
        Ok(Some(self.head.clone()))
    }
}

fn run_git(args: &[&str], dir: Option<&Path>) -> Result<String> {
    let mut cmd = Command::new("git");
    cmd.args(args);
    if let Some(d) = dir {
        cmd.current_dir(d);
    }

    let output = cmd
        .output()
        .with_context(|| format!("Failed to execute 'git {}'. Is git installed?", args[0]))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args[0], stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn git_clone(url: &str, shallow: bool, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create cache directory: {}", parent.display()))?;
    }

    let dest_str = dest.to_string_lossy().into_owned();
    let mut args = vec!["clone", "--single-branch"];
    if shallow {
        args.extend(["--depth", "1"]);
    }
    args.push(url);
    args.push(&dest_str);
    run_git(&args, None)?;
    Ok(())
}

fn git_pull(repo_dir: &Path, shallow: bool) -> Result<()> {
    let mut fetch = vec!["fetch", "origin", "HEAD"];
    if shallow {
        fetch.extend(["--depth", "1"]);
    }
    run_git(&fetch, Some(repo_dir))?;
    run_git(&["reset", "--hard", "FETCH_HEAD"], Some(repo_dir))?;
    Ok(())
}

fn git_head_sha(repo_dir: &Path) -> Result<String> {
    run_git(&["rev-parse", "HEAD"], Some(repo_dir))
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.trim_end_matches('/').as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join(".git/objects")).unwrap();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::write(root.join("README.md"), "# Demo\n").unwrap();
        fs::write(root.join("src/lib.rs"), "pub fn demo() {}\n").unwrap();
        fs::write(root.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::write(root.join("build/out.txt"), "generated\n").unwrap();
        tmp
    }

    #[tokio::test]
    async fn test_lists_relative_paths_without_git_dir() {
        let tmp = tree();
        let source = LocalSource::new(tmp.path(), &SourcesConfig::default()).unwrap();
        let paths: Vec<String> = source
            .list_files()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(paths, vec!["README.md", "build/out.txt", "src/lib.rs"]);

        let bytes = source.read_file("src/lib.rs").await.unwrap();
        assert_eq!(bytes, b"pub fn demo() {}\n");
    }

    #[tokio::test]
    async fn test_exclude_globs() {
        let tmp = tree();
        let config = SourcesConfig {
            exclude_globs: vec!["build/**".to_string()],
            ..SourcesConfig::default()
        };
        let source = LocalSource::new(tmp.path(), &config).unwrap();
        let files = source.list_files().await.unwrap();
        assert!(files.iter().all(|e| !e.path.starts_with("build/")));
    }

    #[tokio::test]
    async fn test_content_version_tracks_listing() {
        let tmp = tree();
        let source = LocalSource::new(tmp.path(), &SourcesConfig::default()).unwrap();
        let v1 = source.content_version().await.unwrap().unwrap();
        assert_eq!(source.content_version().await.unwrap().unwrap(), v1);
        assert!(v1.starts_with("sha256:"));

        fs::write(tmp.path().join("src/lib.rs"), "pub fn demo() { println!(\"changed\"); }\n").unwrap();
        let v2 = source.content_version().await.unwrap().unwrap();
        assert_ne!(v1, v2);

        let pinned = LocalSource::new(tmp.path(), &SourcesConfig::default())
            .unwrap()
            .with_version(Some("release-1".to_string()));
        assert_eq!(pinned.content_version().await.unwrap().as_deref(), Some("release-1"));
    }

    #[test]
    fn test_missing_root() {
        let tmp = TempDir::new().unwrap();
        assert!(LocalSource::new(&tmp.path().join("nope"), &SourcesConfig::default()).is_err());
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://github.com/acme/widgets"));
        assert!(is_remote("git@github.com:acme/widgets.git"));
        assert!(!is_remote("./widgets"));
        assert!(!is_remote("/srv/repos/widgets"));
    }

    #[test]
    fn test_short_hash_ignores_trailing_slash() {
        assert_eq!(short_hash("https://x/y/"), short_hash("https://x/y"));
        assert_eq!(short_hash("https://x/y").len(), 12);
    }
}
