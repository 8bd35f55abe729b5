use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use crate::config::IndexerConfig;

/// Enumerates code files under a project root.
///
/// Honours `.gitignore`, skips hidden entries, drops any path with a
/// component matching an ignore pattern and keeps only recognized extensions.
pub struct Walker {
    root: PathBuf,
    extensions: HashSet<String>,
    ignore_patterns: Vec<String>,
}

impl Walker {
    pub fn new(root: PathBuf, config: &IndexerConfig) -> Self {
        Self {
            root,
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            ignore_patterns: config.ignore_patterns.clone(),
        }
    }

    /// Whether `path` has one of the configured extensions.
    pub fn is_code_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .map(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
            .unwrap_or(false)
    }

    fn is_ignored(&self, relative: &Path) -> bool {
        relative.components().any(|component| {
            let part = component.as_os_str().to_string_lossy();
            self.ignore_patterns.iter().any(|p| part == p.as_str())
        })
    }

    /// Code files as paths relative to the root, sorted.
    pub fn collect_files(&self) -> Vec<PathBuf> {
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .require_git(false)
            .hidden(true);

        let mut overrides = OverrideBuilder::new(&self.root);
        for pattern in &self.ignore_patterns {
            let _ = overrides.add(&format!("!{}", pattern));
            let _ = overrides.add(&format!("!{}/**", pattern));
        }
        if let Ok(overrides) = overrides.build() {
            builder.overrides(overrides);
        }

        let mut files: Vec<PathBuf> = builder
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(Path::to_path_buf)
            })
            .filter(|relative| !self.is_ignored(relative))
            .filter(|relative| self.is_code_file(relative))
            .collect();

        files.sort();
        files
    }
}
