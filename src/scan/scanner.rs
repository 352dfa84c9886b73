//! Manifest file discovery with optional path filtering

use crate::error::{Error, Result};
use crate::utils::normalize_path;
use ignore::WalkBuilder;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MANIFEST_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// A manifest file found under a branch root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestFile {
    pub path: PathBuf,
    /// Path relative to the scanned root, always `/`-separated.
    pub relative_path: String,
}

/// Walks a branch checkout and collects YAML files.
pub struct ManifestScanner {
    root_path: PathBuf,
    file_regex: Option<Regex>,
}

impl ManifestScanner {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self { root_path: root_path.into(), file_regex: None }
    }

    /// Only keep files whose relative path matches `pattern`.
    pub fn file_regex(mut self, pattern: Option<&str>) -> Result<Self> {
        self.file_regex = match pattern {
            Some(p) => Some(Regex::new(p).map_err(|source| Error::InvalidFileRegex {
                pattern: p.to_string(),
                source,
            })?),
            None => None,
        };
        Ok(self)
    }

    fn has_manifest_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext))
    }

    /// Files are returned in deterministic order by relative path.
    pub fn scan(&self) -> Result<Vec<ManifestFile>> {
        debug!(dir = %self.root_path.display(), "Fetching all files in dir");

        let mut builder = WalkBuilder::new(&self.root_path);
        builder
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .ignore(false)
            .follow_links(false)
            .hidden(false)
            .parents(false)
            .filter_entry(|entry| entry.file_name() != ".git");

        let mut files = Vec::new();
        for entry_result in builder.build() {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "Error reading directory entry");
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if !Self::has_manifest_extension(path) {
                continue;
            }

            let rel_path = match path.strip_prefix(&self.root_path) {
                Ok(p) => normalize_path(&p.to_string_lossy()),
                Err(_) => continue,
            };

            if let Some(regex) = &self.file_regex {
                if !regex.is_match(&rel_path) {
                    continue;
                }
            }

            files.push(ManifestFile { path: path.to_path_buf(), relative_path: rel_path });
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        match &self.file_regex {
            Some(regex) => debug!(
                dir = %self.root_path.display(),
                "Found {} yaml files matching regex: {}",
                files.len(),
                regex.as_str()
            ),
            None => debug!(dir = %self.root_path.display(), "Found {} yaml files", files.len()),
        }

        Ok(files)
    }
}
