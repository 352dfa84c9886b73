//! Changed-file matching for watch annotations
//!
//! Two annotations decide whether a resource cares about a change:
//! `argocd-diff-preview/watch-pattern` holds comma-separated regexes matched
//! against the changed paths, and the controller's own
//! `argocd.argoproj.io/manifest-generate-paths` holds semicolon-separated
//! paths resolved against the resource's source paths.

use crate::document::Document;
use crate::utils::clean_path;
use globset::GlobBuilder;
use regex::Regex;
use serde_yaml::Value;
use tracing::{debug, warn};

/// Does any watch-pattern regex match any changed file?
///
/// An invalid regex rejects the resource unless `ignore_invalid` is set, in
/// which case it is skipped.
pub fn matches_watch_pattern(
    patterns: &str,
    files_changed: &[String],
    ignore_invalid: bool,
    resource: &str,
) -> bool {
    for pattern in patterns.split(',').map(str::trim) {
        if pattern.is_empty() {
            continue;
        }

        let regex = match Regex::new(pattern) {
            Ok(r) => r,
            Err(_) if ignore_invalid => {
                warn!(resource, "Ignoring invalid watch pattern '{}'", pattern);
                continue;
            }
            Err(_) => {
                warn!(resource, "Invalid watch pattern '{}'", pattern);
                return false;
            }
        };

        if let Some(file) = files_changed.iter().find(|f| regex.is_match(f)) {
            debug!(resource, "file '{}' matches watch pattern '{}'", file, pattern);
            return true;
        }
    }

    debug!(resource, "no files changed match watch pattern");
    false
}

/// Resolve the entries of a manifest-generate-paths annotation to absolute,
/// cleaned paths.
///
/// Absolute entries are kept. Relative entries are joined onto
/// `spec.source.path` when it is set, and otherwise onto every
/// `spec.sources[*].path`.
pub fn resolve_generate_paths(annotation: &str, document: &Document) -> Vec<String> {
    let single_source = document.get_str(&["spec", "source", "path"]).filter(|p| !p.is_empty());
    let multi_sources: Vec<&str> = document
        .get_sequence(&["spec", "sources"])
        .map(|sources| {
            sources
                .iter()
                .filter_map(|s| s.get("path").and_then(Value::as_str))
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let mut resolved = Vec::new();
    for entry in annotation.split(';').map(str::trim) {
        if entry.starts_with('/') {
            resolved.push(clean_path(entry));
        } else if let Some(source) = single_source {
            resolved.push(clean_path(&format!("/{source}/{entry}")));
        } else {
            resolved.extend(multi_sources.iter().map(|s| clean_path(&format!("/{s}/{entry}"))));
        }
    }
    resolved
}

/// Does any changed file fall under one of the manifest-generate-paths?
///
/// Each pair is checked by exact match, then by the file's directory lying
/// under the path, then by glob. The first hit wins.
pub fn matches_generate_paths(annotation: &str, document: &Document, files_changed: &[String], resource: &str) -> bool {
    let refresh_paths = resolve_generate_paths(annotation, document);
    debug!(resource, "Paths to compare with files changed: {:?}", refresh_paths);

    for file in files_changed {
        let file = if file.starts_with('/') { file.clone() } else { format!("/{file}") };
        for item in &refresh_paths {
            if file == *item || is_under_root(item, &file) || glob_matches(item, &file) {
                debug!(resource, "file '{}' matches manifest-generate-path '{}'", file, item);
                return true;
            }
        }
    }

    debug!(resource, "no files changed match manifest-generate-paths");
    false
}

/// Is the directory containing `file` equal to or below `root`?
fn is_under_root(root: &str, file: &str) -> bool {
    if root == "/" {
        return true;
    }
    let cleaned = clean_path(file);
    let dir = match cleaned.rfind('/') {
        Some(idx) => &cleaned[..=idx],
        None => "",
    };
    if dir == root {
        return true;
    }
    let dir = if dir.ends_with('/') { dir.to_string() } else { format!("{dir}/") };
    let root = if root.ends_with('/') { root.to_string() } else { format!("{root}/") };
    dir.starts_with(&root)
}

/// Shell-style match where `*` and `?` never cross a `/`.
fn glob_matches(pattern: &str, file: &str) -> bool {
    match GlobBuilder::new(pattern).literal_separator(true).build() {
        Ok(glob) => glob.compile_matcher().is_match(file),
        Err(_) => false,
    }
}
