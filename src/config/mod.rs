//! Run configuration
//!
//! Values come from, in increasing precedence: built-in defaults, a config
//! file (`argocd-diff-preview.toml` / `.yaml` / `.yml`), and CLI flags.

pub mod loader;
pub mod merge;

pub use loader::load_config;
pub use merge::{merge_cli_with_config, CliOverrides};

use crate::domain::{FilterOptions, Selector};
use crate::error::Result;
use crate::extract::HiddenResourceRule;
use crate::patch::PatchOptions;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub base_branch: String,
    pub target_branch: Option<String>,
    /// Repository under review, e.g. `org/repo`. Sources pointing elsewhere
    /// are left untouched.
    pub repo: Option<String>,
    pub argocd_namespace: String,
    pub output_folder: PathBuf,

    /// Regex on file paths relative to the branch root.
    pub file_regex: Option<String>,
    /// Label selectors, e.g. `team=a,tier!=db`.
    pub selector: Option<String>,
    pub files_changed: Option<Vec<String>>,
    pub watch_if_no_watch_pattern_found: bool,
    pub ignore_invalid_watch_pattern: bool,
    pub redirect_target_revisions: Vec<String>,
    /// Hidden-resource rules, e.g. `:Secret:*`.
    pub hide_resources: Option<String>,

    /// Command that expands an ApplicationSet file, e.g. `argocd appset generate -o yaml`.
    pub appset_command: Option<String>,
    pub expansion_retries: u32,
    pub keep_scratch_files: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_branch: "main".to_string(),
            target_branch: None,
            repo: None,
            argocd_namespace: "argocd".to_string(),
            output_folder: PathBuf::from("./output"),
            file_regex: None,
            selector: None,
            files_changed: None,
            watch_if_no_watch_pattern_found: false,
            ignore_invalid_watch_pattern: false,
            redirect_target_revisions: Vec::new(),
            hide_resources: None,
            appset_command: None,
            expansion_retries: 5,
            keep_scratch_files: false,
        }
    }
}

impl Config {
    pub fn filter_options(&self) -> Result<FilterOptions> {
        let selectors = match &self.selector {
            Some(s) => Selector::parse_list(s)?,
            None => Vec::new(),
        };
        Ok(FilterOptions {
            file_regex: self.file_regex.clone(),
            selectors,
            files_changed: self.files_changed.clone().unwrap_or_default(),
            ignore_invalid_watch_pattern: self.ignore_invalid_watch_pattern,
            watch_if_no_watch_pattern_found: self.watch_if_no_watch_pattern_found,
        })
    }

    pub fn patch_options(&self) -> PatchOptions {
        PatchOptions {
            argocd_namespace: self.argocd_namespace.clone(),
            repo: self.repo.clone().unwrap_or_default(),
            redirect_target_revisions: self.redirect_target_revisions.clone(),
        }
    }

    pub fn hidden_rules(&self) -> Result<Vec<HiddenResourceRule>> {
        match &self.hide_resources {
            Some(rules) => HiddenResourceRule::parse_list(rules),
            None => Ok(Vec::new()),
        }
    }
}
