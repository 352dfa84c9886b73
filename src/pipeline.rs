//! End-to-end control flow for one run
//!
//! Both branches move through the stages together because filtering and
//! duplicate suppression look at both sides at once:
//!
//! discover → select → patch → unique ids → expand ApplicationSets →
//! select again → unique ids → drop unchanged, then, with a sandbox
//! cluster, extract → drop identical renders.

use crate::domain::{Branch, FilterOptions};
use crate::error::Result;
use crate::expand::{expand_application_sets, AppSetExpander, ExpandOptions};
use crate::extract::{extract_branch, remove_identical_apps, ClusterService, ExtractOptions, ExtractedApp, PollProgress};
use crate::filter::select_across_branches;
use crate::patch::{patch_resources, PatchOptions};
use crate::resource::Resource;
use crate::scan::discover_resources;
use crate::unique::{remove_duplicate_resources, unique_ids};
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub filter: FilterOptions,
    pub patch: PatchOptions,
    pub expand: ExpandOptions,
}

/// The patched, de-duplicated resources of both branches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedBranches {
    pub base: Vec<Resource>,
    pub target: Vec<Resource>,
}

impl PreparedBranches {
    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.target.is_empty()
    }
}

/// Normalised renders of both branches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedBranches {
    pub base: Vec<ExtractedApp>,
    pub target: Vec<ExtractedApp>,
}

/// Poll state per branch, kept by the caller for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct RenderProgress {
    pub base: PollProgress,
    pub target: PollProgress,
}

/// Run every stage up to the point where resources would be applied.
///
/// Without an expander ApplicationSets are passed through unexpanded.
pub fn prepare_branches(
    base: &Branch,
    target: &Branch,
    expander: Option<&dyn AppSetExpander>,
    options: &PipelineOptions,
) -> Result<PreparedBranches> {
    let file_regex = options.filter.file_regex.as_deref();
    let base_resources = discover_resources(base, file_regex)?;
    let target_resources = discover_resources(target, file_regex)?;

    let (base_resources, target_resources) =
        select_across_branches(base_resources, target_resources, &options.filter);

    let base_resources = unique_ids(patch_resources(base_resources, base, &options.patch)?, base);
    let target_resources = unique_ids(patch_resources(target_resources, target, &options.patch)?, target);

    let (base_resources, target_resources) = match expander {
        Some(expander) => {
            std::fs::create_dir_all(&options.expand.scratch_dir)?;
            let base_apps = expand_application_sets(base_resources, base, expander, &options.expand, &options.patch);
            let target_apps =
                expand_application_sets(target_resources, target, expander, &options.expand, &options.patch);
            let (base_apps, target_apps) = select_across_branches(base_apps, target_apps, &options.filter);
            (unique_ids(base_apps, base), unique_ids(target_apps, target))
        }
        None => (base_resources, target_resources),
    };

    let (base_resources, target_resources) = remove_duplicate_resources(base_resources, target_resources);
    info!(
        "Prepared {} base and {} target Application[Sets]",
        base_resources.len(),
        target_resources.len()
    );
    Ok(PreparedBranches { base: base_resources, target: target_resources })
}

fn applications_only(resources: &[Resource], branch: &Branch) -> Vec<Resource> {
    resources
        .iter()
        .filter(|r| {
            if r.is_application_set() {
                warn!(branch = %branch.name, "Skipping unexpanded ApplicationSet {}", r.id);
                return false;
            }
            true
        })
        .cloned()
        .collect()
}

/// Render both branches in the sandbox, base first, then drop Applications
/// that render identically on both sides.
pub fn render_branches(
    cluster: &dyn ClusterService,
    prepared: &PreparedBranches,
    base: &Branch,
    target: &Branch,
    options: &ExtractOptions,
    progress: &mut RenderProgress,
) -> Result<RenderedBranches> {
    let base_apps = applications_only(&prepared.base, base);
    let target_apps = applications_only(&prepared.target, target);

    let base_rendered = extract_branch(cluster, &base_apps, base, options, &mut progress.base)?;
    let target_rendered = extract_branch(cluster, &target_apps, target, options, &mut progress.target)?;

    let (base, target) = remove_identical_apps(base_rendered, target_rendered);
    Ok(RenderedBranches { base, target })
}
