//! Shared CLI utilities.

use anyhow::{Context, Result};
use std::path::Path;

/// Split a comma-separated flag value, trimming whitespace and discarding
/// empty segments. Returns `None` when the flag was not given.
pub fn parse_csv(value: Option<&str>) -> Option<Vec<String>> {
    value.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    })
}

/// `Some(true)` when a boolean switch was passed, `None` otherwise, so an
/// absent switch does not override the config file.
pub fn flag(value: bool) -> Option<bool> {
    value.then_some(true)
}

pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
