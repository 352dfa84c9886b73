//! Config file loading

use super::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const CANDIDATES: &[&str] = &[
    "argocd-diff-preview.toml",
    ".argocd-diff-preview.toml",
    "argocd-diff-preview.yaml",
    "argocd-diff-preview.yml",
];

/// Load the config from `config_path`, or from the first candidate file
/// found in `dir`.
///
/// An explicit file that cannot be parsed is an error. An auto-discovered
/// one is reported with a warning and defaults are used instead.
pub fn load_config(dir: &Path, config_path: Option<&Path>) -> Result<Config> {
    let explicit = config_path.is_some();
    let Some(config_file) = config_path.map(Path::to_path_buf).or_else(|| discover_config(dir)) else {
        return Ok(Config::default());
    };

    let content = fs::read_to_string(&config_file)
        .with_context(|| format!("Failed reading config file: {}", config_file.display()))?;

    match parse_config(&content, &config_file) {
        Ok(cfg) => {
            tracing::debug!("Loaded config from {}", config_file.display());
            Ok(cfg)
        }
        Err(e) if explicit => Err(e),
        Err(e) => {
            tracing::warn!("Ignoring auto-discovered config {}: {:#}", config_file.display(), e);
            Ok(Config::default())
        }
    }
}

fn parse_config(content: &str, config_file: &Path) -> Result<Config> {
    let ext = config_file.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "toml" => toml::from_str(content)
            .with_context(|| format!("Invalid TOML config: {}", config_file.display())),
        "yaml" | "yml" => {
            if content.trim().is_empty() {
                return Ok(Config::default());
            }
            serde_yaml::from_str(content)
                .with_context(|| format!("Invalid YAML config: {}", config_file.display()))
        }
        other => anyhow::bail!(
            "Unsupported config extension '.{}' for file {}",
            other,
            config_file.display()
        ),
    }
}

fn discover_config(dir: &Path) -> Option<PathBuf> {
    CANDIDATES.iter().map(|c| dir.join(c)).find(|p| p.is_file())
}
