//! Condition-message vocabularies reported by the GitOps controller

use once_cell::sync::Lazy;
use regex::Regex;

/// Messages meaning the Application can never render. The run aborts.
pub const FATAL_ERRORS: &[&str] = &[
    "helm template .",
    "authentication required",
    "authentication failed",
    "error logging into OCI registry",
    "path does not exist",
    "error converting YAML to JSON",
    "Unknown desc = `helm template .",
    "Unknown desc = `kustomize build",
    "Unknown desc = Unable to resolve",
    "is not a valid chart repository or cannot be reached",
    "Unknown desc = repository not found",
    "to a commit SHA",
    "error fetching chart: failed to fetch chart: failed to get command args to log",
    "ComparisonError: Failed to load target state: failed to get cluster version for cluster",
];

/// Messages caused by slow or flaky infrastructure. A refresh usually clears them.
pub const TRANSIENT_ERRORS: &[&str] = &[
    "Client.Timeout",
    "failed to get git client for repo",
    "rpc error: code = Unknown desc = Get \"https",
    "i/o timeout",
    "Could not resolve host: github.com",
    ":8081: connect: connection refused",
    "Temporary failure in name resolution",
    "=git-upload-pack",
    "DeadlineExceeded",
    "application does not exist",
];

/// Errors that are expected when the sandbox runs without cluster-wide roles.
static EXPECTED_ERRORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r".*Failed to load live state: failed to get cluster info for .*?: error synchronizing cache state : failed to sync cluster .*?: failed to load initial state of resource.*",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

fn contains_any(message: &str, needles: &[&str]) -> bool {
    !message.is_empty() && needles.iter().any(|n| message.contains(n))
}

/// Condition types such as `ComparisonError` or `SyncError`.
pub fn is_error_condition(condition_type: &str) -> bool {
    condition_type.to_lowercase().contains("error")
}

pub fn is_fatal(message: &str) -> bool {
    contains_any(message, FATAL_ERRORS)
}

pub fn is_transient(message: &str) -> bool {
    contains_any(message, TRANSIENT_ERRORS)
}

pub fn is_expected(message: &str) -> bool {
    EXPECTED_ERRORS.iter().any(|re| re.is_match(message))
}
