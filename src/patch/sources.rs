//! Pointing Application sources at the branch under review

use super::RedirectTarget;
use serde_yaml::{Mapping, Value};
use tracing::debug;

/// Revision assumed when a source does not declare one.
pub const DEFAULT_REVISION: &str = "HEAD";

/// Redirect `spec.source` and every `spec.sources[*]` found in `spec`.
///
/// Returns how many sources were rewritten.
pub fn redirect_sources(spec: &mut Mapping, target: &RedirectTarget<'_>, file: &str) -> usize {
    let mut redirected = 0;

    if let Some(source) = spec.get_mut("source").and_then(Value::as_mapping_mut) {
        redirected += usize::from(redirect_source(source, target, file));
    }

    if let Some(sources) = spec.get_mut("sources").and_then(Value::as_sequence_mut) {
        for source in sources.iter_mut().filter_map(Value::as_mapping_mut) {
            redirected += usize::from(redirect_source(source, target, file));
        }
    }

    redirected
}

/// Redirect a single source map. Helm chart sources and sources from other
/// repositories are left alone.
pub fn redirect_source(source: &mut Mapping, target: &RedirectTarget<'_>, file: &str) -> bool {
    if source.contains_key("chart") {
        debug!(file, "Found helm chart");
        return false;
    }

    let Some(repo_url) = source.get("repoURL").and_then(Value::as_str) else {
        debug!(file, "Found no 'repoURL' under source");
        return false;
    };
    if !target.matches_repo(repo_url) {
        debug!(file, "Skipping source: {} (repoURL does not match {})", repo_url, target.repo);
        return false;
    }

    let current = match source.get("targetRevision").and_then(Value::as_str) {
        Some(rev) => rev.to_string(),
        None => {
            debug!(file, "Found no 'targetRevision' under source");
            source.insert("targetRevision".into(), DEFAULT_REVISION.into());
            DEFAULT_REVISION.to_string()
        }
    };

    if current == target.branch || !target.should_redirect(&current) {
        return false;
    }

    debug!(file, "Redirecting targetRevision from {} to {}", current, target.branch);
    source.insert("targetRevision".into(), target.branch.into());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPO: &str = "github.com/org/gitops";

    fn spec(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).expect("valid yaml")
    }

    fn revision(spec: &Mapping, path: &[&str]) -> Option<String> {
        let mut node = spec.get(path[0])?;
        for key in &path[1..] {
            node = match key.parse::<usize>() {
                Ok(idx) => node.get(idx)?,
                Err(_) => node.get(*key)?,
            };
        }
        node.as_str().map(str::to_string)
    }

    #[test]
    fn test_redirects_matching_single_source() {
        let mut s = spec("source:\n  repoURL: https://GitHub.com/org/gitops.git\n  targetRevision: main\n");
        let target = RedirectTarget::new(REPO, "feature", &[]);
        assert_eq!(redirect_sources(&mut s, &target, "f"), 1);
        assert_eq!(revision(&s, &["source", "targetRevision"]).as_deref(), Some("feature"));
    }

    #[test]
    fn test_missing_revision_defaults_to_head_then_redirects() {
        let mut s = spec("source:\n  repoURL: https://github.com/org/gitops\n");
        let allow = vec!["main".to_string()];
        redirect_sources(&mut s, &RedirectTarget::new(REPO, "feature", &allow), "f");
        assert_eq!(revision(&s, &["source", "targetRevision"]).as_deref(), Some("HEAD"));

        redirect_sources(&mut s, &RedirectTarget::new(REPO, "feature", &[]), "f");
        assert_eq!(revision(&s, &["source", "targetRevision"]).as_deref(), Some("feature"));
    }

    #[test]
    fn test_skips_charts_and_foreign_repos() {
        let mut s = spec(
            "sources:\n\
             - repoURL: https://github.com/org/gitops\n  chart: nginx\n  targetRevision: 1.0.0\n\
             - repoURL: https://github.com/other/repo\n  targetRevision: main\n\
             - repoURL: https://github.com/org/gitops\n  targetRevision: main\n",
        );
        let target = RedirectTarget::new(REPO, "feature", &[]);
        assert_eq!(redirect_sources(&mut s, &target, "f"), 1);
        assert_eq!(revision(&s, &["sources", "0", "targetRevision"]).as_deref(), Some("1.0.0"));
        assert_eq!(revision(&s, &["sources", "1", "targetRevision"]).as_deref(), Some("main"));
        assert_eq!(revision(&s, &["sources", "2", "targetRevision"]).as_deref(), Some("feature"));
    }

    #[test]
    fn test_allow_list_limits_redirects() {
        let mut s = spec(
            "sources:\n\
             - repoURL: https://github.com/org/gitops\n  targetRevision: v1.2.3\n\
             - repoURL: https://github.com/org/gitops\n  targetRevision: main\n",
        );
        let allow = vec!["main".to_string(), "HEAD".to_string()];
        assert_eq!(redirect_sources(&mut s, &RedirectTarget::new(REPO, "feature", &allow), "f"), 1);
        assert_eq!(revision(&s, &["sources", "0", "targetRevision"]).as_deref(), Some("v1.2.3"));
        assert_eq!(revision(&s, &["sources", "1", "targetRevision"]).as_deref(), Some("feature"));
    }
}
