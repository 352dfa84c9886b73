//! ApplicationSet expansion
//!
//! Each selected ApplicationSet is written to a scratch file and handed to an
//! [`AppSetExpander`], which returns the Applications the controller would
//! generate from it. Generated Applications inherit the ApplicationSet's
//! origin file, are patched like declared ones, and replace the
//! ApplicationSet in the branch's resource set. One ApplicationSet failing to
//! expand is logged and skipped.

use crate::document::Document;
use crate::domain::{Branch, ResourceKind};
use crate::error::{Error, Result};
use crate::patch::{patch_resource, PatchOptions};
use crate::resource::Resource;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Turns a serialised ApplicationSet into the YAML of the Applications it generates.
pub trait AppSetExpander {
    fn generate(&self, appset_path: &Path) -> Result<String>;
}

/// Runs an external command with the ApplicationSet path appended, e.g.
/// `argocd appset generate -o yaml <path>`.
#[derive(Debug, Clone)]
pub struct CommandExpander {
    program: String,
    args: Vec<String>,
}

impl CommandExpander {
    /// Split a whitespace-separated command line. `None` when it is blank.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self { program, args: parts.collect() })
    }
}

impl AppSetExpander for CommandExpander {
    fn generate(&self, appset_path: &Path) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(appset_path)
            .output()
            .map_err(|e| Error::collaborator("appset generate", format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::collaborator("appset generate", stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[derive(Debug, Clone)]
pub struct ExpandOptions {
    /// Directory for the scratch ApplicationSet files.
    pub scratch_dir: PathBuf,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Leave scratch files behind for debugging.
    pub keep_scratch_files: bool,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir(),
            max_attempts: 5,
            retry_delay: Duration::from_secs(1),
            keep_scratch_files: false,
        }
    }
}

/// Call the expander until it succeeds or `max_attempts` calls have failed.
pub fn generate_with_retry(
    expander: &dyn AppSetExpander,
    appset_path: &Path,
    max_attempts: u32,
    retry_delay: Duration,
) -> Result<String> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        debug!("Appset generate attempt {}/{}", attempt, max_attempts);
        match expander.generate(appset_path) {
            Ok(out) => return Ok(out),
            Err(err) if attempt < max_attempts => {
                warn!(error = %err, "Appset generate attempt {}/{} failed", attempt, max_attempts);
                std::thread::sleep(retry_delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Parse expander output as either a list of documents or a single one.
///
/// Blank and `null` output yield no documents.
pub fn parse_generated(output: &str) -> Result<Vec<Document>> {
    let trimmed = output.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    match serde_yaml::from_str::<Value>(trimmed)? {
        Value::Sequence(items) => Ok(items.into_iter().map(Document::new).collect()),
        Value::Null => Ok(Vec::new()),
        other => Ok(vec![Document::new(other)]),
    }
}

/// Expand every ApplicationSet in `resources`. Applications pass through.
pub fn expand_application_sets(
    resources: Vec<Resource>,
    branch: &Branch,
    expander: &dyn AppSetExpander,
    options: &ExpandOptions,
    patch_options: &PatchOptions,
) -> Vec<Resource> {
    debug!(branch = %branch.name, "Generating Applications from ApplicationSets");

    let mut expanded = Vec::with_capacity(resources.len());
    let mut appset_count = 0;
    let mut generated_count = 0;

    for resource in resources {
        if resource.kind != ResourceKind::ApplicationSet {
            expanded.push(resource);
            continue;
        }
        appset_count += 1;

        let apps = expand_one(&resource, branch, expander, options, patch_options);
        debug!(
            branch = %branch.name,
            file = %resource.file_name,
            appset = %resource.id,
            "Generated {} Applications from ApplicationSet",
            apps.len()
        );
        generated_count += apps.len();
        expanded.extend(apps);
    }

    if appset_count > 0 {
        info!(
            branch = %branch.name,
            "Generated {} applications from {} ApplicationSets",
            generated_count,
            appset_count
        );
    } else {
        info!(branch = %branch.name, "No ApplicationSets found");
    }

    expanded
}

fn scratch_path(options: &ExpandOptions, appset: &Resource) -> PathBuf {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    options.scratch_dir.join(format!("{}-{}.yaml", appset.id, nanos))
}

fn expand_one(
    appset: &Resource,
    branch: &Branch,
    expander: &dyn AppSetExpander,
    options: &ExpandOptions,
    patch_options: &PatchOptions,
) -> Vec<Resource> {
    let yaml = match appset.to_yaml_string() {
        Ok(y) => y,
        Err(err) => {
            error!(branch = %branch.name, error = %err, "Failed to convert ApplicationSet {} to YAML", appset.id);
            return Vec::new();
        }
    };

    let path = scratch_path(options, appset);
    if let Err(err) = std::fs::write(&path, yaml) {
        error!(branch = %branch.name, error = %err, "Failed to write ApplicationSet to {}", path.display());
        return Vec::new();
    }

    let output = generate_with_retry(expander, &path, options.max_attempts, options.retry_delay);

    if !options.keep_scratch_files {
        if let Err(err) = std::fs::remove_file(&path) {
            warn!(branch = %branch.name, error = %err, "Failed to remove temporary file");
        }
    }

    let output = match output {
        Ok(o) => o,
        Err(err) => {
            error!(
                branch = %branch.name,
                error = %err,
                "Failed to generate applications from ApplicationSet {}",
                appset.id
            );
            return Vec::new();
        }
    };

    let documents = match parse_generated(&output) {
        Ok(docs) if docs.is_empty() => {
            warn!(branch = %branch.name, file = %appset.file_name, "ApplicationSet {} generated empty output", appset.id);
            return Vec::new();
        }
        Ok(docs) => docs,
        Err(err) => {
            error!(branch = %branch.name, error = %err, "Failed to read output from ApplicationSet {}", appset.id);
            return Vec::new();
        }
    };

    documents
        .into_iter()
        .filter_map(|doc| generated_application(doc, appset, branch, patch_options))
        .collect()
}

fn generated_application(
    document: Document,
    appset: &Resource,
    branch: &Branch,
    patch_options: &PatchOptions,
) -> Option<Resource> {
    match document.kind() {
        None => {
            error!(file = %appset.file_name, "Output from ApplicationSet contains no kind");
            return None;
        }
        Some("Application") => {}
        Some(_) => {
            error!(file = %appset.file_name, "Output from ApplicationSet contains non-Application resources");
            return None;
        }
    }

    let Some(name) = document.name().map(str::to_string) else {
        error!(file = %appset.file_name, "Generated Application missing name");
        return None;
    };

    let mut app = Resource {
        id: name.clone(),
        name,
        file_name: appset.file_name.clone(),
        kind: ResourceKind::Application,
        branch: branch.branch_type,
        document,
    };

    match patch_resource(&mut app, branch, patch_options) {
        Ok(()) => Some(app),
        Err(err) => {
            error!(branch = %branch.name, error = %err, "Failed to patch application: {}", app.id);
            None
        }
    }
}
