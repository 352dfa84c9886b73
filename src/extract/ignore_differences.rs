//! `ignoreDifferences` rules declared on an Application
//!
//! Each rule selects manifests by kind (and optionally group, name and
//! namespace) and lists JSON pointers and jq path expressions to blank out
//! before diffing. A location ending in a map key deletes that key; one ending
//! in an array index replaces the element with [`MASKED_VALUE`] so the array
//! keeps its shape.

use super::jq_path::{JqPath, PathToken};
use crate::document::{remove_key, Document};
use crate::resource::Resource;
use serde::Deserialize;
use serde_yaml::Value;
use tracing::{debug, warn};

/// Stand-in for array elements hidden by a rule.
pub const MASKED_VALUE: &str = "<argocd-diff-preview:ignored>";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IgnoreDifferenceRule {
    pub group: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub json_pointers: Vec<String>,
    pub jq_path_expressions: Vec<String>,
}

impl IgnoreDifferenceRule {
    pub fn matches(&self, manifest: &Document) -> bool {
        let Some(kind) = manifest.kind() else {
            return false;
        };
        if !self.kind.eq_ignore_ascii_case(kind) {
            return false;
        }
        if !self.group.is_empty() && !self.group.eq_ignore_ascii_case(manifest.group()) {
            return false;
        }
        if !self.name.is_empty() && manifest.name() != Some(self.name.as_str()) {
            return false;
        }
        if !self.namespace.is_empty() && manifest.namespace() != Some(self.namespace.as_str()) {
            return false;
        }
        true
    }

    /// Apply every pointer and jq path expression of this rule to `manifest`.
    pub fn apply(&self, manifest: &mut Document) {
        let mut value = std::mem::take(manifest).into_value();
        for pointer in &self.json_pointers {
            if !mask_pointer(&mut value, pointer) {
                debug!(pointer = %pointer, "JSON pointer not present in manifest");
            }
        }
        for expression in &self.jq_path_expressions {
            mask_jq_path(&mut value, expression);
        }
        *manifest = Document::new(value);
    }
}

/// Read the rules declared by `app`. Entries without a kind, or without any
/// pointer or jq expression, are skipped.
pub fn parse_rules(app: &Resource) -> Vec<IgnoreDifferenceRule> {
    let mut path = app.kind.spec_path().to_vec();
    path.push("ignoreDifferences");
    let Some(entries) = app.document.get_sequence(&path) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match serde_yaml::from_value::<IgnoreDifferenceRule>(entry.clone()) {
            Ok(rule) => Some(rule),
            Err(err) => {
                warn!(app = %app.id, error = %err, "Skipping malformed ignoreDifferences entry");
                None
            }
        })
        .filter(|rule| {
            if rule.kind.is_empty() {
                debug!(app = %app.id, "Skipping ignoreDifferences entry without kind");
                return false;
            }
            !rule.json_pointers.is_empty() || !rule.jq_path_expressions.is_empty()
        })
        .collect()
}

/// Apply every matching rule to every manifest.
pub fn apply_rules(manifests: &mut [Document], rules: &[IgnoreDifferenceRule]) {
    if rules.is_empty() {
        return;
    }
    for manifest in manifests.iter_mut() {
        for rule in rules {
            if rule.matches(manifest) {
                rule.apply(manifest);
            }
        }
    }
}

fn decode_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Delete or mask the node at `pointer`. Returns false, leaving `root`
/// untouched, when the pointer is malformed or the path does not exist.
pub fn mask_pointer(root: &mut Value, pointer: &str) -> bool {
    let Some(rest) = pointer.strip_prefix('/') else {
        return false;
    };
    let tokens: Vec<String> = rest.split('/').map(decode_token).collect();
    mask_tokens(root, &tokens)
}

/// Delete or mask every location `expression` selects. Invalid expressions
/// are logged and ignored.
pub fn mask_jq_path(root: &mut Value, expression: &str) -> usize {
    let path = match JqPath::parse(expression) {
        Ok(path) => path,
        Err(err) => {
            debug!(error = %err, "Skipping jqPathExpression");
            return 0;
        }
    };
    let locations = path.locations(root);
    locations
        .iter()
        .map(|location| {
            let tokens: Vec<String> = location
                .iter()
                .map(|token| match token {
                    PathToken::Key(key) => key.clone(),
                    PathToken::Index(i) => i.to_string(),
                })
                .collect();
            mask_tokens(root, &tokens)
        })
        .filter(|masked| *masked)
        .count()
}

fn mask_tokens(root: &mut Value, tokens: &[String]) -> bool {
    let Some((last, parents)) = tokens.split_last() else {
        return false;
    };

    let mut node = root;
    for token in parents {
        node = match node {
            Value::Mapping(mapping) => match mapping.get_mut(token.as_str()) {
                Some(child) => child,
                None => return false,
            },
            Value::Sequence(seq) => match token.parse::<usize>().ok().and_then(|i| seq.get_mut(i)) {
                Some(child) => child,
                None => return false,
            },
            _ => return false,
        };
    }

    match node {
        Value::Mapping(mapping) => remove_key(mapping, last).is_some(),
        Value::Sequence(seq) => match last.parse::<usize>().ok().and_then(|i| seq.get_mut(i)) {
            Some(slot) => {
                *slot = Value::String(MASKED_VALUE.to_string());
                true
            }
            None => false,
        },
        _ => false,
    }
}
