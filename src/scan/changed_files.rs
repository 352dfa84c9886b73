//! Changed-file detection between two branch checkouts

use crate::error::{Error, Result};
use crate::utils::{file_sha256, normalize_path};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;
use walkdir::WalkDir;

const IGNORED_DIRS: &[&str] = &[".git"];

/// Compare two directory trees by content hash.
///
/// Returns the sorted relative paths of files that were added, modified or
/// deleted, plus how long the comparison took.
pub fn list_changed_files(base: &Path, target: &Path) -> Result<(Vec<String>, Duration)> {
    let started = Instant::now();
    let base_hashes = directory_hashes(base)?;
    let target_hashes = directory_hashes(target)?;

    let mut changed = Vec::new();
    for (rel_path, target_hash) in &target_hashes {
        match base_hashes.get(rel_path) {
            None => {
                debug!(file = %rel_path, "New file detected");
                changed.push(rel_path.clone());
            }
            Some(base_hash) if base_hash != target_hash => {
                debug!(file = %rel_path, "Modified file detected");
                changed.push(rel_path.clone());
            }
            Some(_) => {}
        }
    }
    for rel_path in base_hashes.keys() {
        if !target_hashes.contains_key(rel_path) {
            debug!(file = %rel_path, "Deleted file detected");
            changed.push(rel_path.clone());
        }
    }

    changed.sort();
    Ok((changed, started.elapsed()))
}

fn directory_hashes(root: &Path) -> Result<BTreeMap<String, String>> {
    let mut hashes = BTreeMap::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        let skip = entry.file_type().is_dir()
            && entry.file_name().to_str().is_some_and(|name| IGNORED_DIRS.contains(&name));
        !skip
    });

    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            Error::ReadFile { path, source: err.into() }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel_path = match entry.path().strip_prefix(root) {
            Ok(p) => normalize_path(&p.to_string_lossy()),
            Err(_) => continue,
        };
        let hash = file_sha256(entry.path())
            .map_err(|source| Error::ReadFile { path: entry.path().to_path_buf(), source })?;
        hashes.insert(rel_path, hash);
    }

    Ok(hashes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_detects_added_modified_and_deleted_files() {
        let base = TempDir::new().expect("tmp");
        let target = TempDir::new().expect("tmp");

        fs::create_dir_all(base.path().join("apps")).unwrap();
        fs::create_dir_all(target.path().join("apps")).unwrap();
        fs::write(base.path().join("apps/same.yaml"), "a").unwrap();
        fs::write(target.path().join("apps/same.yaml"), "a").unwrap();
        fs::write(base.path().join("apps/modified.yaml"), "old").unwrap();
        fs::write(target.path().join("apps/modified.yaml"), "new").unwrap();
        fs::write(base.path().join("deleted.yaml"), "gone").unwrap();
        fs::write(target.path().join("added.yaml"), "new").unwrap();

        let (changed, _) = list_changed_files(base.path(), target.path()).unwrap();
        assert_eq!(changed, vec!["added.yaml", "apps/modified.yaml", "deleted.yaml"]);
    }

    #[test]
    fn test_ignores_git_directory() {
        let base = TempDir::new().expect("tmp");
        let target = TempDir::new().expect("tmp");
        fs::create_dir_all(base.path().join(".git")).unwrap();
        fs::create_dir_all(target.path().join(".git")).unwrap();
        fs::write(base.path().join(".git/HEAD"), "ref: main").unwrap();
        fs::write(target.path().join(".git/HEAD"), "ref: feature").unwrap();

        let (changed, _) = list_changed_files(base.path(), target.path()).unwrap();
        assert!(changed.is_empty());
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let base = TempDir::new().expect("tmp");
        let missing = base.path().join("nope");
        assert!(list_changed_files(&missing, base.path()).is_err());
    }
}
