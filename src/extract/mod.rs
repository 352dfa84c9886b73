//! Extraction and normalisation of rendered manifests
//!
//! After a branch's Applications are applied to the sandbox, the controller
//! renders them. This module waits for that (see [`poll`]), pulls the raw
//! manifests back, undoes the sandbox renaming and normalises them into
//! [`ExtractedApp`]s ready for diffing.

use crate::document::Document;
use crate::domain::{Branch, BranchType};
use crate::error::{Error, Result};
use crate::resource::{resources_to_string, Resource};
use std::path::PathBuf;
use tracing::{error, info};

pub mod hidden;
pub mod ignore_differences;
pub mod jq_path;
pub mod normalize;
pub mod poll;
pub mod prefix;
pub mod vocabulary;

pub use hidden::HiddenResourceRule;
pub use ignore_differences::{IgnoreDifferenceRule, MASKED_VALUE};
pub use normalize::{normalize_manifests, parse_manifest_dump, sort_manifests, TRACKING_ID_ANNOTATION};
pub use poll::{poll_until_resolved, AppStatus, ClusterService, Condition, PollProgress, PollSettings};
pub use prefix::{add_prefix, remove_prefix, replace_id_in_manifests};

/// The rendered manifests of one Application on one branch.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedApp {
    pub id: String,
    pub name: String,
    pub source_path: String,
    pub branch: BranchType,
    pub manifests: Vec<Document>,
}

impl ExtractedApp {
    pub fn new(resource: &Resource, manifests: Vec<Document>) -> Self {
        Self {
            id: resource.id.clone(),
            name: resource.name.clone(),
            source_path: resource.file_name.clone(),
            branch: resource.branch,
            manifests,
        }
    }

    /// Sort the manifests and render them as one YAML stream. Manifests
    /// matching a hidden rule are replaced by a placeholder line.
    pub fn flatten(&mut self, hidden_rules: &[HiddenResourceRule]) -> String {
        sort_manifests(&mut self.manifests);
        self.manifests
            .iter()
            .filter_map(|manifest| {
                if hidden_rules.iter().any(|rule| rule.matches(manifest)) {
                    return Some(hidden::placeholder(manifest));
                }
                match manifest.to_yaml_string() {
                    Ok(yaml) => Some(yaml),
                    Err(err) => {
                        error!(app = %self.id, error = %err, "Failed to convert manifest to YAML");
                        None
                    }
                }
            })
            .collect::<Vec<_>>()
            .join("---\n")
    }
}

/// Drop apps that render identically on both branches.
pub fn remove_identical_apps(
    base: Vec<ExtractedApp>,
    target: Vec<ExtractedApp>,
) -> (Vec<ExtractedApp>, Vec<ExtractedApp>) {
    let identical = |app: &ExtractedApp, others: &[ExtractedApp]| {
        others.iter().any(|o| o.id == app.id && o.manifests == app.manifests)
    };

    let kept_base: Vec<ExtractedApp> = base.iter().filter(|a| !identical(a, &target)).cloned().collect();
    let kept_target: Vec<ExtractedApp> = target.into_iter().filter(|a| !identical(a, &base)).collect();

    info!(
        "Skipped {} applications with identical manifests",
        base.len() - kept_base.len()
    );
    (kept_base, kept_target)
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Prefix distinguishing this run's Applications in the sandbox.
    pub prefix: String,
    /// Where the batch applied to the sandbox is written.
    pub scratch_dir: PathBuf,
    pub poll: PollSettings,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { prefix: "adp".to_string(), scratch_dir: std::env::temp_dir(), poll: PollSettings::default() }
    }
}

fn patch_error(resource: &Resource, err: crate::document::PathError) -> Error {
    Error::Patch { resource: resource.long_name(), path: err.path, reason: err.reason }
}

/// Apply `resources` to the sandbox, wait until they render and return
/// their normalised manifests, in the order of `resources`.
///
/// `progress` keeps whatever was extracted even when this fails.
pub fn extract_branch(
    cluster: &dyn ClusterService,
    resources: &[Resource],
    branch: &Branch,
    options: &ExtractOptions,
    progress: &mut PollProgress,
) -> Result<Vec<ExtractedApp>> {
    if resources.is_empty() {
        info!(branch = %branch.name, "No applications to extract");
        return Ok(Vec::new());
    }

    let mut sandboxed = Vec::with_capacity(resources.len());
    for resource in resources {
        let mut copy = resource.clone();
        copy.enrich().map_err(|e| patch_error(resource, e))?;
        add_prefix(&mut copy, &options.prefix)?;
        sandboxed.push(copy);
    }

    std::fs::create_dir_all(&options.scratch_dir)?;
    let batch_path = options.scratch_dir.join(format!("{}-applications.yaml", branch.branch_type));
    std::fs::write(&batch_path, resources_to_string(&sandboxed))?;
    info!(branch = %branch.name, "Applying {} applications", sandboxed.len());
    cluster.apply(&batch_path)?;

    let names: Vec<String> = sandboxed.iter().map(|r| r.id.clone()).collect();
    poll_until_resolved(cluster, &names, &options.poll, progress)?;

    let mut extracted = Vec::with_capacity(resources.len());
    for (original, renamed) in resources.iter().zip(&sandboxed) {
        let raw = progress.manifests.get(&renamed.id).map(String::as_str).unwrap_or_default();
        let mut manifests = parse_manifest_dump(raw)?;
        replace_id_in_manifests(&mut manifests, &renamed.id, &original.id);
        extracted.push(ExtractedApp::new(original, normalize_manifests(manifests, Some(original))));
    }

    info!(branch = %branch.name, "Extracted manifests for {} applications", extracted.len());
    Ok(extracted)
}
