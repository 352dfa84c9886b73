//! Resource selection
//!
//! [`filter`] decides for one resource whether the run should render it.
//! [`select_across_branches`] applies that decision to both branches at once
//! so a resource selected on either side is rendered on both, while an
//! ignore annotation on either side removes it from both.

use crate::domain::{FilterOptions, Operator, Selector};
use crate::resource::Resource;
use std::collections::BTreeSet;
use tracing::{debug, info};

pub mod watch;

pub use watch::{matches_generate_paths, matches_watch_pattern, resolve_generate_paths};

pub const IGNORE_ANNOTATION: &str = "argocd-diff-preview/ignore";
pub const WATCH_PATTERN_ANNOTATION: &str = "argocd-diff-preview/watch-pattern";
pub const MANIFEST_GENERATE_PATHS_ANNOTATION: &str = "argocd.argoproj.io/manifest-generate-paths";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterOutcome {
    pub selected: bool,
    pub ignored_by_annotation: bool,
}

impl FilterOutcome {
    const SELECTED: Self = Self { selected: true, ignored_by_annotation: false };
    const REJECTED: Self = Self { selected: false, ignored_by_annotation: false };
    const IGNORED: Self = Self { selected: false, ignored_by_annotation: true };
}

/// Decide whether `resource` is rendered. Stages short-circuit in order:
/// ignore annotation, label selectors, changed files.
pub fn filter(resource: &Resource, options: &FilterOptions) -> FilterOutcome {
    let long_name = resource.long_name();

    if is_ignored(resource) {
        debug!(resource = %long_name, "ignored because of `{}: true`", IGNORE_ANNOTATION);
        return FilterOutcome::IGNORED;
    }

    if !options.selectors.is_empty() && !matches_selectors(resource, &options.selectors) {
        debug!(resource = %long_name, "does not match label selectors");
        return FilterOutcome::REJECTED;
    }

    if !options.files_changed.is_empty() && !watches_changed_files(resource, options) {
        debug!(resource = %long_name, "does not watch any changed file");
        return FilterOutcome::REJECTED;
    }

    FilterOutcome::SELECTED
}

fn is_ignored(resource: &Resource) -> bool {
    resource.document.annotations().get(IGNORE_ANNOTATION).is_some_and(|v| v == "true")
}

/// Every selector must hold. A resource without the label fails either operator.
pub fn matches_selectors(resource: &Resource, selectors: &[Selector]) -> bool {
    let labels = resource.document.labels();
    if labels.is_empty() {
        return false;
    }

    selectors.iter().all(|selector| match labels.get(&selector.key) {
        None => false,
        Some(value) => match selector.operator {
            Operator::Eq => *value == selector.value,
            Operator::Ne => *value != selector.value,
        },
    })
}

fn watches_changed_files(resource: &Resource, options: &FilterOptions) -> bool {
    let long_name = resource.long_name();

    if options.files_changed.iter().any(|f| *f == resource.file_name) {
        debug!(resource = %long_name, "resource file itself is in the list of changed files");
        return true;
    }

    let annotations = resource.document.annotations();
    let watch_pattern = annotations.get(WATCH_PATTERN_ANNOTATION).map(|s| s.trim()).unwrap_or("");
    let generate_paths =
        annotations.get(MANIFEST_GENERATE_PATHS_ANNOTATION).map(|s| s.trim()).unwrap_or("");

    if watch_pattern.is_empty() && generate_paths.is_empty() {
        debug!(
            resource = %long_name,
            "no watch annotations found, falling back to {}",
            options.watch_if_no_watch_pattern_found
        );
        return options.watch_if_no_watch_pattern_found;
    }

    (!watch_pattern.is_empty()
        && matches_watch_pattern(
            watch_pattern,
            &options.files_changed,
            options.ignore_invalid_watch_pattern,
            &long_name,
        ))
        || (!generate_paths.is_empty()
            && matches_generate_paths(
                generate_paths,
                &resource.document,
                &options.files_changed,
                &long_name,
            ))
}

/// Filter both branches together.
///
/// A resource id selected in either branch is kept in both. An id carrying
/// the ignore annotation in either branch is dropped from both.
pub fn select_across_branches(
    base: Vec<Resource>,
    target: Vec<Resource>,
    options: &FilterOptions,
) -> (Vec<Resource>, Vec<Resource>) {
    log_selection_intent(options);

    let mut selected_ids = BTreeSet::new();
    let mut ignored_ids = BTreeSet::new();
    for resource in base.iter().chain(target.iter()) {
        let outcome = filter(resource, options);
        if outcome.ignored_by_annotation {
            ignored_ids.insert(resource.id.clone());
        } else if outcome.selected {
            selected_ids.insert(resource.id.clone());
        }
    }

    let keep = |resources: Vec<Resource>| -> Vec<Resource> {
        let before = resources.len();
        let kept: Vec<Resource> = resources
            .into_iter()
            .filter(|r| selected_ids.contains(&r.id) && !ignored_ids.contains(&r.id))
            .collect();
        if before != kept.len() {
            info!(
                "Found {} Application[Sets] before filtering and {} after filtering",
                before,
                kept.len()
            );
        } else {
            info!("Found {} Application[Sets]", before);
        }
        kept
    };

    (keep(base), keep(target))
}

fn log_selection_intent(options: &FilterOptions) {
    if options.is_unrestricted() {
        return;
    }
    let selectors =
        options.selectors.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
    let files = options.files_changed.join("', '");
    match (options.selectors.is_empty(), options.files_changed.is_empty()) {
        (false, false) => info!(
            "Will only run on Applications that match '{}' and watch these files: '{}'",
            selectors, files
        ),
        (false, true) => info!("Will only run on Applications that match '{}'", selectors),
        _ => info!("Will only run on Applications that watch these files: '{}'", files),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::domain::BranchType;

    fn resource(file: &str, yaml: &str, branch: BranchType) -> Resource {
        let doc = Document::from_yaml(yaml).expect("valid yaml");
        Resource::from_document(doc, file, branch).expect("resource")
    }

    fn app(labels: &str, annotations: &str) -> Resource {
        let yaml = format!(
            "kind: Application\nmetadata:\n  name: app1\n  labels: {labels}\n  annotations: {annotations}\nspec:\n  source:\n    path: apps/web\n"
        );
        resource("apps/app1.yaml", &yaml, BranchType::Base)
    }

    fn selectors(list: &str) -> Vec<Selector> {
        Selector::parse_list(list).expect("selectors")
    }

    #[test]
    fn test_no_options_selects_everything() {
        let outcome = filter(&app("{}", "{}"), &FilterOptions::default());
        assert_eq!(outcome, FilterOutcome::SELECTED);
    }

    #[test]
    fn test_ignore_annotation_reported_distinctly() {
        let r = app("{}", "{argocd-diff-preview/ignore: 'true'}");
        assert_eq!(filter(&r, &FilterOptions::default()), FilterOutcome::IGNORED);

        let r = app("{}", "{argocd-diff-preview/ignore: 'false'}");
        assert!(filter(&r, &FilterOptions::default()).selected);
    }

    #[test]
    fn test_selector_eq_and_ne() {
        let r = app("{team: infra}", "{}");
        let opts = |s: &str| FilterOptions { selectors: selectors(s), ..Default::default() };

        assert!(filter(&r, &opts("team=infra")).selected);
        assert!(!filter(&r, &opts("team=web")).selected);
        assert!(filter(&r, &opts("team!=web")).selected);
        assert!(!filter(&r, &opts("team!=infra")).selected);
        assert!(!filter(&r, &opts("tier!=frontend")).selected);
        assert!(!filter(&app("{}", "{}"), &opts("team!=web")).selected);
    }

    #[test]
    fn test_changed_files_stage_skipped_when_empty() {
        let r = app("{}", "{argocd-diff-preview/watch-pattern: 'nothing'}");
        assert!(filter(&r, &FilterOptions::default()).selected);
    }

    #[test]
    fn test_own_file_changed_selects() {
        let r = app("{}", "{argocd-diff-preview/watch-pattern: 'nothing'}");
        let opts = FilterOptions { files_changed: vec!["apps/app1.yaml".into()], ..Default::default() };
        assert!(filter(&r, &opts).selected);
    }

    #[test]
    fn test_no_watch_annotations_uses_fallback() {
        let r = app("{}", "{argocd-diff-preview/watch-pattern: '  '}");
        let mut opts = FilterOptions { files_changed: vec!["other.yaml".into()], ..Default::default() };
        assert!(!filter(&r, &opts).selected);
        opts.watch_if_no_watch_pattern_found = true;
        assert!(filter(&r, &opts).selected);
    }

    #[test]
    fn test_watch_pattern_or_generate_paths() {
        let opts =
            FilterOptions { files_changed: vec!["apps/web/values.yaml".into()], ..Default::default() };
        let by_pattern = app("{}", "{argocd-diff-preview/watch-pattern: 'apps/web/.*'}");
        let by_paths = app("{}", "{argocd.argoproj.io/manifest-generate-paths: '.'}");
        let neither = app("{}", "{argocd.argoproj.io/manifest-generate-paths: /other}");
        assert!(filter(&by_pattern, &opts).selected);
        assert!(filter(&by_paths, &opts).selected);
        assert!(!filter(&neither, &opts).selected);
    }

    #[test]
    fn test_selected_in_target_only_appears_in_both() {
        let base = resource(
            "a.yaml",
            "kind: Application\nmetadata:\n  name: app1\n  labels: {team: web}\n",
            BranchType::Base,
        );
        let target = resource(
            "a.yaml",
            "kind: Application\nmetadata:\n  name: app1\n  labels: {team: infra}\n",
            BranchType::Target,
        );
        let opts = FilterOptions { selectors: selectors("team=infra"), ..Default::default() };

        let (base, target) = select_across_branches(vec![base], vec![target], &opts);
        assert_eq!(base.len(), 1);
        assert_eq!(target.len(), 1);
    }

    #[test]
    fn test_ignored_in_one_branch_dropped_from_both() {
        let base = resource(
            "a.yaml",
            "kind: Application\nmetadata:\n  name: app1\n  annotations: {argocd-diff-preview/ignore: 'true'}\n",
            BranchType::Base,
        );
        let target = resource("a.yaml", "kind: Application\nmetadata:\n  name: app1\n", BranchType::Target);
        let other = resource("b.yaml", "kind: Application\nmetadata:\n  name: app2\n", BranchType::Target);

        let (base, target) =
            select_across_branches(vec![base], vec![target, other], &FilterOptions::default());
        assert!(base.is_empty());
        assert_eq!(target.len(), 1);
        assert_eq!(target[0].id, "app2");
    }
}
