//! Error types for the resource pipeline
//!
//! Per-item problems (a malformed document, one ApplicationSet that fails to
//! expand, a manifest that cannot be serialised) are logged and dropped where
//! they happen and never surface here. Everything in [`Error`] aborts the run.

use std::path::PathBuf;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Substrings of operator error messages that have a canned remediation hint.
const HELP_MESSAGES: &[(&str, &str)] = &[
    (
        "failed to get cluster version for cluster",
        "This error usually happens if the operator is installed with 'createClusterRoles: false' \
         and the API based sync status lookup is not enabled",
    ),
    (
        "authentication required",
        "The sandbox operator could not read a repository. Provide repository credentials as secrets \
         in the operator namespace",
    ),
    (
        "repository not found",
        "Check the repoURL of the failing Application and that the sandbox has credentials for it",
    ),
];

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid label selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid ignore resource rule format: {0} (expected group:kind:name)")]
    InvalidResourceRule(String),

    #[error("invalid file regex '{pattern}': {source}")]
    InvalidFileRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(
        "only 2 child generators are allowed for matrix generator '{path}' in ApplicationSet: {resource}"
    )]
    TooManyMatrixChildren { resource: String, path: String },

    #[error("too many levels of nested matrix generators at '{path}' in ApplicationSet: {resource}")]
    GeneratorNestingTooDeep { resource: String, path: String },

    #[error("failed to patch {resource}: cannot set '{path}': {reason}")]
    Patch { resource: String, path: String, reason: String },

    #[error("{operation} failed: {message}")]
    Collaborator { operation: &'static str, message: String },

    #[error("application '{app}' failed: {message}")]
    ApplicationFailed { app: String, message: String },

    #[error(
        "timed out after {elapsed_secs}s waiting for applications: {resolved} resolved, {outstanding} outstanding"
    )]
    PollTimeout { elapsed_secs: u64, resolved: usize, outstanding: usize },

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn collaborator(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Collaborator { operation, message: message.into() }
    }

    /// Remediation hint for a known operator failure, if one exists.
    pub fn help_message(&self) -> Option<&'static str> {
        let message = match self {
            Self::ApplicationFailed { message, .. } => message.as_str(),
            Self::Collaborator { message, .. } => message.as_str(),
            _ => return None,
        };
        HELP_MESSAGES.iter().find(|(needle, _)| message.contains(needle)).map(|(_, help)| *help)
    }

    /// Structural errors mean the real operator would reject the input as well.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidSelector { .. }
                | Self::InvalidResourceRule(_)
                | Self::InvalidFileRegex { .. }
                | Self::TooManyMatrixChildren { .. }
                | Self::GeneratorNestingTooDeep { .. }
        )
    }
}
