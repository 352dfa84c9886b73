//! Branch prefixes for Application names in the shared sandbox

use crate::document::Document;
use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::utils::sha256_hex;
use serde_yaml::Value;

/// Kubernetes label values (and so Application names the controller tracks)
/// are capped at 63 characters; 10 are kept free for controller suffixes.
pub const MAX_PREFIXED_LEN: usize = 53;

/// The sandbox-side name for `id`: `<prefix>-<b|t>-<id>`, or a hash of `id`
/// in place of `id` when the result would be too long.
pub fn prefixed_id(prefix: &str, branch_short: &str, id: &str) -> String {
    let prefix_size = prefix.len() + branch_short.len() + 2;
    let suffix = if prefix_size + id.len() > MAX_PREFIXED_LEN {
        let hash = sha256_hex(id.as_bytes());
        let keep = MAX_PREFIXED_LEN.saturating_sub(prefix_size).min(hash.len());
        hash[..keep].to_string()
    } else {
        id.to_string()
    };
    format!("{prefix}-{branch_short}-{suffix}")
}

/// Rename `resource` to its sandbox-side name.
pub fn add_prefix(resource: &mut Resource, prefix: &str) -> Result<()> {
    let new_id = prefixed_id(prefix, resource.branch.short_name(), &resource.id);
    let long_name = resource.long_name();
    resource.set_id(new_id).map_err(|e| Error::Patch {
        resource: long_name,
        path: e.path,
        reason: e.reason,
    })
}

/// Strip a `<prefix>-<b|t>-` prefix. Ids that do not carry it are returned as-is.
pub fn remove_prefix(id: &str, prefix: &str) -> String {
    ["b", "t"]
        .iter()
        .find_map(|short| id.strip_prefix(&format!("{prefix}-{short}-")))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(id)
        .to_string()
}

/// Replace every occurrence of `old` with `new` in the string values of
/// `manifests`. Keys are left alone.
pub fn replace_id_in_manifests(manifests: &mut [Document], old: &str, new: &str) {
    if old == new || old.is_empty() {
        return;
    }
    for manifest in manifests.iter_mut() {
        let mut value = std::mem::take(manifest).into_value();
        replace_in_value(&mut value, old, new);
        *manifest = Document::new(value);
    }
}

fn replace_in_value(value: &mut Value, old: &str, new: &str) {
    match value {
        Value::String(s) if s.contains(old) => *s = s.replace(old, new),
        Value::Mapping(m) => m.values_mut().for_each(|v| replace_in_value(v, old, new)),
        Value::Sequence(seq) => seq.iter_mut().for_each(|v| replace_in_value(v, old, new)),
        Value::Tagged(tagged) => replace_in_value(&mut tagged.value, old, new),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BranchType;

    fn app(name: &str, branch: BranchType) -> Resource {
        let doc = Document::from_yaml(&format!(
            "apiVersion: argoproj.io/v1alpha1\nkind: Application\nmetadata:\n  name: {name}\n"
        ))
        .unwrap();
        Resource::from_document(doc, "apps.yaml", branch).unwrap()
    }

    #[test]
    fn test_prefixed_id_short_names() {
        assert_eq!(prefixed_id("abc", "b", "my-app"), "abc-b-my-app");
        assert_eq!(prefixed_id("abc", "t", "my-app"), "abc-t-my-app");
    }

    #[test]
    fn test_prefixed_id_hashes_long_names() {
        let long = "a".repeat(60);
        let id = prefixed_id("abc", "t", &long);
        assert_eq!(id.len(), MAX_PREFIXED_LEN);
        assert!(id.starts_with("abc-t-"));
        assert_eq!(&id[6..], &sha256_hex(long.as_bytes())[..47]);
        // same input always yields the same name
        assert_eq!(id, prefixed_id("abc", "t", &long));
    }

    #[test]
    fn test_add_prefix_updates_document_name() {
        let mut resource = app("app1", BranchType::Target);
        add_prefix(&mut resource, "pr1").unwrap();
        assert_eq!(resource.id, "pr1-t-app1");
        assert_eq!(resource.document.name(), Some("pr1-t-app1"));
        assert_eq!(resource.name, "app1");
    }

    #[test]
    fn test_remove_prefix() {
        assert_eq!(remove_prefix("pr1-b-app1", "pr1"), "app1");
        assert_eq!(remove_prefix("pr1-t-app1", "pr1"), "app1");
        assert_eq!(remove_prefix("other", "pr1"), "other");
        assert_eq!(remove_prefix("pr1x-foo", "pr1"), "pr1x-foo");
        assert_eq!(remove_prefix("pr1-x-app1", "pr1"), "pr1-x-app1");
        assert_eq!(remove_prefix("pr1-b-", "pr1"), "pr1-b-");
    }

    #[test]
    fn test_replace_id_in_manifests_rewrites_nested_strings() {
        let mut manifests = vec![Document::from_yaml(
            "metadata:\n  name: pr1-b-app1-web\n  labels:\n    app: pr1-b-app1\nspec:\n  args: [\"--name=pr1-b-app1\", 3]\n",
        )
        .unwrap()];
        replace_id_in_manifests(&mut manifests, "pr1-b-app1", "app1");
        assert_eq!(manifests[0].name(), Some("app1-web"));
        assert_eq!(manifests[0].get_str(&["metadata", "labels", "app"]), Some("app1"));
        let args = manifests[0].get_sequence(&["spec", "args"]).unwrap();
        assert_eq!(args[0].as_str(), Some("--name=app1"));
        assert_eq!(args[1].as_u64(), Some(3));
    }
}
