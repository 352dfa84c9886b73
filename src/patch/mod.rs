//! Rewriting resources for the sandbox cluster
//!
//! Every selected Application and ApplicationSet is pinned to the sandbox
//! namespace, the `default` project and the in-cluster destination, loses its
//! sync policy and cascade-delete finalizer, and has its sources and git
//! generators pointed at the branch being rendered. Missing optional fields
//! are logged and skipped. Only malformed generator trees, or a field that
//! cannot be written, fail the run.

use crate::document::PathError;
use crate::domain::{Branch, ResourceKind};
use crate::error::{Error, Result};
use crate::resource::Resource;
use serde_yaml::Value;
use tracing::{debug, info, warn};

pub mod generators;
pub mod sources;

pub use generators::{GeneratorNode, GeneratorWalker};
pub use sources::{redirect_source, redirect_sources};

pub const DEFAULT_PROJECT: &str = "default";
pub const IN_CLUSTER_SERVER: &str = "https://kubernetes.default.svc";
pub const RESOURCES_FINALIZER: &str = "resources-finalizer.argocd.argoproj.io";

/// Where sources should point and which existing revisions may be moved.
#[derive(Debug, Clone, Copy)]
pub struct RedirectTarget<'a> {
    /// Substring identifying the repository under review, e.g. `org/repo`.
    pub repo: &'a str,
    pub branch: &'a str,
    /// When non-empty, only these revisions are redirected.
    pub redirect_revisions: &'a [String],
}

impl<'a> RedirectTarget<'a> {
    pub fn new(repo: &'a str, branch: &'a str, redirect_revisions: &'a [String]) -> Self {
        Self { repo, branch, redirect_revisions }
    }

    pub fn matches_repo(&self, repo_url: &str) -> bool {
        repo_url.to_lowercase().contains(&self.repo.to_lowercase())
    }

    pub fn should_redirect(&self, revision: &str) -> bool {
        self.redirect_revisions.is_empty() || self.redirect_revisions.iter().any(|r| r == revision)
    }
}

/// Settings shared by every resource patched in a run.
#[derive(Debug, Clone, Default)]
pub struct PatchOptions {
    pub argocd_namespace: String,
    pub repo: String,
    pub redirect_target_revisions: Vec<String>,
}

fn patch_error(resource: &Resource, err: PathError) -> Error {
    Error::Patch { resource: resource.long_name(), path: err.path, reason: err.reason }
}

/// Pin `metadata.namespace` to the operator namespace.
pub fn set_namespace(resource: &mut Resource, namespace: &str) -> Result<()> {
    resource.document.set_namespace(namespace).map_err(|e| patch_error(resource, e))
}

/// Force the project to `default`, creating the field when absent.
pub fn set_project_to_default(resource: &mut Resource) -> Result<()> {
    let mut path = resource.kind.spec_path().to_vec();
    path.push("project");
    if resource.document.get_str(&path).is_none() {
        debug!(
            file = %resource.file_name,
            "no '{}' key found in {}", path.join("."), resource.long_name()
        );
    }
    resource.document.set(&path, DEFAULT_PROJECT.into()).map_err(|e| patch_error(resource, e))
}

/// Point an Application at the in-cluster API server, dropping any named
/// destination. ApplicationSets are untouched.
pub fn point_destination_to_in_cluster(resource: &mut Resource) -> Result<()> {
    if resource.kind != ResourceKind::Application {
        return Ok(());
    }
    let Some(destination) =
        resource.document.get_mut(&["spec", "destination"]).and_then(Value::as_mapping_mut)
    else {
        debug!(file = %resource.file_name, "no 'spec.destination' key found in {}", resource.long_name());
        return Ok(());
    };

    crate::document::remove_key(destination, "name");
    destination.insert("server".into(), IN_CLUSTER_SERVER.into());
    Ok(())
}

/// Delete the sync policy so the sandbox never syncs or prunes on its own.
pub fn remove_sync_policy(resource: &mut Resource) {
    let spec_path = resource.kind.spec_path();
    if resource.document.get_mapping(spec_path).is_none() {
        warn!(file = %resource.file_name, "Can't remove 'syncPolicy' because spec not found");
        return;
    }
    let mut path = spec_path.to_vec();
    path.push("syncPolicy");
    resource.document.remove(&path);
}

/// Drop the controller's cascade-delete finalizer, keeping any others.
pub fn remove_resources_finalizer(resource: &mut Resource) {
    let Some(finalizers) = resource
        .document
        .get_mut(&["metadata", "finalizers"])
        .and_then(Value::as_sequence_mut)
    else {
        return;
    };

    finalizers.retain(|f| !f.as_str().is_some_and(|s| s.starts_with(RESOURCES_FINALIZER)));
    if finalizers.is_empty() {
        resource.document.remove(&["metadata", "finalizers"]);
    }
}

/// Redirect `spec.source`/`spec.sources` (or the template equivalents).
pub fn redirect_resource_sources(resource: &mut Resource, target: &RedirectTarget<'_>) {
    let file = resource.file_name.clone();
    let long_name = resource.long_name();
    match resource.document.get_mut(resource.kind.spec_path()).and_then(Value::as_mapping_mut) {
        Some(spec) => {
            let redirected = sources::redirect_sources(spec, target, &file);
            debug!(file = %file, "Redirected {} source(s) in {}", redirected, long_name);
        }
        None => warn!(file = %file, "No spec found in {}", long_name),
    }
}

/// Validate and redirect an ApplicationSet's generators.
pub fn redirect_generators(resource: &mut Resource, target: &RedirectTarget<'_>) -> Result<()> {
    if resource.kind != ResourceKind::ApplicationSet {
        return Ok(());
    }
    let name = resource.id.clone();
    let file = resource.file_name.clone();
    let Some(generators) =
        resource.document.get_mut(&["spec", "generators"]).and_then(Value::as_sequence_mut)
    else {
        debug!(file = %file, branch = target.branch, "no 'spec.generators' key found in ApplicationSet: {}", name);
        return Ok(());
    };

    let mut walker = GeneratorWalker::new(&name, &file, target);
    walker.walk(generators, "spec.generators", 0).inspect_err(|err| {
        tracing::error!(file = %file, branch = target.branch, error = %err, "error processing generators");
    })?;
    debug!(file = %file, "Redirected {} git generator(s) in ApplicationSet: {}", walker.redirected(), name);
    Ok(())
}

/// Apply every sandbox rewrite to one resource.
pub fn patch_resource(resource: &mut Resource, branch: &Branch, options: &PatchOptions) -> Result<()> {
    let target =
        RedirectTarget::new(&options.repo, &branch.name, &options.redirect_target_revisions);

    set_namespace(resource, &options.argocd_namespace)?;
    remove_sync_policy(resource);
    set_project_to_default(resource)?;
    point_destination_to_in_cluster(resource)?;
    remove_resources_finalizer(resource);
    redirect_resource_sources(resource, &target);
    redirect_generators(resource, &target)
}

/// Patch every resource of one branch. The first structural error aborts.
pub fn patch_resources(
    mut resources: Vec<Resource>,
    branch: &Branch,
    options: &PatchOptions,
) -> Result<Vec<Resource>> {
    if resources.is_empty() {
        return Ok(resources);
    }
    info!(branch = %branch.name, "Patching {} Application[Sets]", resources.len());

    for resource in &mut resources {
        patch_resource(resource, branch, options).inspect_err(|_| {
            info!(branch = %branch.name, "Failed to patch {}", resource.long_name());
        })?;
    }
    Ok(resources)
}
