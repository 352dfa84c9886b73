//! The GitOps resource model
//!
//! A [`Resource`] is one Application or ApplicationSet declaration together
//! with where it came from. `id` starts out equal to the declared name and is
//! rewritten by the uniqueness and prefixing stages; `name` never changes.

use crate::document::{Document, PathError};
use crate::domain::{BranchType, ResourceKind};
use tracing::{debug, warn};

/// Annotation recording the file an Application was declared in.
pub const SOURCE_PATH_ANNOTATION: &str = "argocd-diff-preview.io/source-path";

/// Annotation recording the declared name before any renaming.
pub const ORIGINAL_NAME_ANNOTATION: &str = "argocd-diff-preview.io/original-application-name";

#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub file_name: String,
    pub kind: ResourceKind,
    pub branch: BranchType,
    pub document: Document,
}

impl Resource {
    /// Classify a parsed document. Returns `None` for anything that is not a
    /// named Application or ApplicationSet.
    pub fn from_document(
        document: Document,
        file_name: &str,
        branch: BranchType,
    ) -> Option<Self> {
        let Some(kind) = document.kind() else {
            debug!(file = file_name, "No 'kind' field found in document");
            return None;
        };
        let kind = ResourceKind::from_kind(kind)?;

        let Some(name) = document.name().map(str::to_string) else {
            debug!(file = file_name, "No 'metadata.name' field found in document");
            return None;
        };

        Some(Self {
            id: name.clone(),
            name,
            file_name: file_name.to_string(),
            kind,
            branch,
            document,
        })
    }

    /// Rewrite the identity, keeping `metadata.name` in the document in sync.
    pub fn set_id(&mut self, id: impl Into<String>) -> Result<(), PathError> {
        let id = id.into();
        self.document.set_name(&id)?;
        self.id = id;
        Ok(())
    }

    /// `kind/id` label for logs and error messages.
    pub fn long_name(&self) -> String {
        format!("{}/{}", self.kind, self.id)
    }

    pub fn is_application_set(&self) -> bool {
        self.kind == ResourceKind::ApplicationSet
    }

    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        self.document.to_yaml_string()
    }

    /// Stamp the origin file and the declared name onto the document so they
    /// survive the round trip through the sandbox cluster.
    pub fn enrich(&mut self) -> Result<(), PathError> {
        let annotations = ["metadata", "annotations"];
        let mut path = annotations.to_vec();
        path.push(SOURCE_PATH_ANNOTATION);
        self.document.set(&path, self.file_name.clone().into())?;
        path.pop();
        path.push(ORIGINAL_NAME_ANNOTATION);
        self.document.set(&path, self.name.clone().into())
    }
}

/// Serialise a resource set as one multi-document YAML stream, each document
/// preceded by a comment naming its origin file.
///
/// Resources that fail to serialise are logged and left out.
pub fn resources_to_string(resources: &[Resource]) -> String {
    resources
        .iter()
        .filter_map(|resource| match resource.to_yaml_string() {
            Ok(yaml) => Some(format!("# File: {}\n{}", resource.file_name, yaml)),
            Err(err) => {
                warn!(
                    file = %resource.file_name,
                    error = %err,
                    "Failed to convert {} to YAML",
                    resource.long_name()
                );
                None
            }
        })
        .collect::<Vec<_>>()
        .join("---\n")
}
