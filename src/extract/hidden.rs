//! Hidden-resource rules: manifests whose body is replaced by a placeholder

use crate::document::Document;
use crate::error::{Error, Result};

const WILDCARD: &str = "*";

/// A `group:kind:name` rule. Each field is either a literal or `*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenResourceRule {
    pub group: String,
    pub kind: String,
    pub name: String,
}

impl HiddenResourceRule {
    /// Parse a single `group:kind:name` rule. The core group is written as
    /// an empty string, e.g. `:Secret:*`.
    pub fn parse(rule: &str) -> Result<Self> {
        let parts: Vec<&str> = rule.trim().split(':').collect();
        match parts.as_slice() {
            [group, kind, name] if !kind.is_empty() && !name.is_empty() => Ok(Self {
                group: group.trim().to_string(),
                kind: kind.trim().to_string(),
                name: name.trim().to_string(),
            }),
            _ => Err(Error::InvalidResourceRule(rule.to_string())),
        }
    }

    /// Parse a comma-separated rule list. Blank entries are ignored.
    pub fn parse_list(rules: &str) -> Result<Vec<Self>> {
        rules
            .split(',')
            .filter(|r| !r.trim().is_empty())
            .map(Self::parse)
            .collect()
    }

    pub fn matches(&self, manifest: &Document) -> bool {
        field_matches(&self.group, manifest.group())
            && field_matches(&self.kind, manifest.kind().unwrap_or_default())
            && field_matches(&self.name, manifest.name().unwrap_or_default())
    }
}

fn field_matches(pattern: &str, value: &str) -> bool {
    pattern == WILDCARD || pattern == value
}

/// The one-line stand-in written instead of a hidden manifest's body.
pub fn placeholder(manifest: &Document) -> String {
    format!(
        "Skipping manifest {}/{}/{}\n",
        manifest.api_version().unwrap_or_default(),
        manifest.kind().unwrap_or_default(),
        manifest.name().unwrap_or_default()
    )
}
