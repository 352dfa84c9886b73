//! Discovery of GitOps resources in a branch checkout

use crate::domain::Branch;
use crate::error::Result;
use crate::resource::Resource;
use tracing::{debug, info, warn};

pub mod changed_files;
pub mod parser;
pub mod scanner;

pub use changed_files::list_changed_files;
pub use parser::parse_documents;
pub use scanner::{ManifestFile, ManifestScanner};

/// Find every Application and ApplicationSet declared under `branch`'s root.
///
/// Unreadable files and documents that are not named Applications or
/// ApplicationSets are skipped.
pub fn discover_resources(branch: &Branch, file_regex: Option<&str>) -> Result<Vec<Resource>> {
    info!(branch = %branch.name, "Fetching all files for branch");

    let files = ManifestScanner::new(branch.root()).file_regex(file_regex)?.scan()?;
    info!(branch = %branch.name, "Found {} files in dir {}", files.len(), branch.root().display());

    let mut resources = Vec::new();
    for file in &files {
        let content = match std::fs::read_to_string(&file.path) {
            Ok(c) => c,
            Err(err) => {
                warn!(file = %file.relative_path, error = %err, "Failed to read file");
                continue;
            }
        };
        debug!(file = %file.relative_path, "Parsing yaml file");

        resources.extend(
            parse_documents(&file.relative_path, &content)
                .into_iter()
                .filter_map(|doc| Resource::from_document(doc, &file.relative_path, branch.branch_type)),
        );
    }

    info!(branch = %branch.name, "Which resulted in {} Application[Sets]", resources.len());
    Ok(resources)
}
