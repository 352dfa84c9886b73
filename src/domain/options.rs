//! Selection intent for one run

use super::Selector;

/// Which resources the run should render. Shared by both branches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOptions {
    /// Only scan files whose relative path matches this regex.
    pub file_regex: Option<String>,
    pub selectors: Vec<Selector>,
    /// Relative paths of files touched by the change under review.
    pub files_changed: Vec<String>,
    /// Skip invalid watch-pattern regexes instead of rejecting the resource.
    pub ignore_invalid_watch_pattern: bool,
    /// Outcome for resources that declare no watch annotations at all.
    pub watch_if_no_watch_pattern_found: bool,
}

impl FilterOptions {
    /// True when neither selectors nor changed files narrow the selection.
    pub fn is_unrestricted(&self) -> bool {
        self.selectors.is_empty() && self.files_changed.is_empty()
    }
}
