//! Version-control snapshot provider: file enumeration, file reads at a
//! revision and commit history.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::config::IndexerConfig;
use crate::indexer::Walker;

/// One commit as reported by `git log`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub email: String,
    pub date: String,
    pub message: String,
    pub files_changed: Vec<String>,
}

/// Canonical repository-relative spelling of `path`: `/` separators, no
/// empty or `.` segments. `None` for paths that climb out with `..`, are
/// absolute, or name nothing.
pub fn normalize_path(path: &str) -> Option<String> {
    if path.starts_with('/') || path.starts_with('\\') {
        return None;
    }
    let mut segments = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// Source of repository content for indexing and pack building.
///
/// Paths are relative to the repository root with `/` separators.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Every recognized code file in the working tree.
    async fn list_code_files(&self) -> Result<Vec<String>>;

    /// Whether `path` has a recognized code extension.
    fn is_code_file(&self, path: &str) -> bool;

    /// File content at `revision`, or in the working tree when `None`.
    /// A missing file is `Ok(None)`.
    async fn read_file(&self, path: &str, revision: Option<&str>) -> Result<Option<String>>;

    /// Last modification time of a working-tree file.
    async fn last_modified(&self, path: &str) -> Result<Option<DateTime<Utc>>>;

    /// Most recent commits, newest first.
    async fn commit_history(&self, limit: usize) -> Result<Vec<CommitInfo>>;
}

/// [`SnapshotProvider`] over a local checkout, shelling out to `git` for
/// history and revision reads.
pub struct GitSnapshot {
    root: PathBuf,
    walker: Walker,
}

impl GitSnapshot {
    pub fn new(root: impl Into<PathBuf>, config: &IndexerConfig) -> Self {
        let root = root.into();
        Self {
            walker: Walker::new(root.clone(), config),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for a repository-relative one, refusing escapes.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
        if escapes {
            bail!("path {} is outside the repository", path);
        }
        Ok(self.root.join(relative))
    }

    async fn run_git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(args)
            .output()
            .await
            .context("Failed to run git")?;

        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl SnapshotProvider for GitSnapshot {
    async fn list_code_files(&self) -> Result<Vec<String>> {
        let root = self.root.clone();
        if !root.is_dir() {
            bail!("repository root {} does not exist", root.display());
        }

        let files = self
            .walker
            .collect_files()
            .into_iter()
            .map(|p| to_slash(&p))
            .collect();
        Ok(files)
    }

    fn is_code_file(&self, path: &str) -> bool {
        self.walker.is_code_file(Path::new(path))
    }

    async fn read_file(&self, path: &str, revision: Option<&str>) -> Result<Option<String>> {
        match revision {
            None => {
                let full = self.resolve(path)?;
                match tokio::fs::read(&full).await {
                    Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(e).with_context(|| format!("Failed to read {}", full.display())),
                }
            }
            Some(rev) => {
                self.resolve(path)?;
                if rev.starts_with('-') || rev.contains(':') {
                    bail!("invalid revision {:?}", rev);
                }
                let spec = format!("{}:{}", rev, path);
                match self.run_git(&["show", &spec]).await {
                    Ok(content) => Ok(Some(content)),
                    Err(e) => {
                        debug!("{} not readable at {}: {:#}", path, rev, e);
                        Ok(None)
                    }
                }
            }
        }
    }

    async fn last_modified(&self, path: &str) -> Result<Option<DateTime<Utc>>> {
        let full = self.resolve(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) => Ok(meta.modified().ok().map(DateTime::<Utc>::from)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to stat {}", full.display())),
        }
    }

    async fn commit_history(&self, limit: usize) -> Result<Vec<CommitInfo>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let format = format!("--format={}", LOG_FORMAT);
        let limit = format!("-{}", limit);
        let output = self
            .run_git(&["log", &format, "--name-only", &limit])
            .await?;
        Ok(parse_log(&output))
    }
}

const LOG_FORMAT: &str = "%H|%an|%ae|%aI|%s";

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse `git log --format=<LOG_FORMAT> --name-only` output.
fn parse_log(output: &str) -> Vec<CommitInfo> {
    let mut commits = Vec::new();
    let mut current: Option<CommitInfo> = None;

    for line in output.lines().filter(|l| !l.is_empty()) {
        if is_commit_line(line) {
            commits.extend(current.take());
            let parts: Vec<&str> = line.splitn(5, '|').collect();
            if let [hash, author, email, date, message] = parts[..] {
                current = Some(CommitInfo {
                    hash: hash.to_string(),
                    author: author.to_string(),
                    email: email.to_string(),
                    date: date.to_string(),
                    message: message.to_string(),
                    files_changed: Vec::new(),
                });
            }
        } else if let Some(commit) = current.as_mut() {
            commit.files_changed.push(line.to_string());
        }
    }
    commits.extend(current);
    commits
}

/// Full 40-hex hash followed by the field separator.
fn is_commit_line(line: &str) -> bool {
    line.len() > 41
        && line.as_bytes()[40] == b'|'
        && line[..40].bytes().all(|b| b.is_ascii_hexdigit())
}
