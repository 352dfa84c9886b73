//! Collision-free identities and unchanged-resource suppression

use crate::domain::Branch;
use crate::resource::Resource;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info};

/// Rename resources that share an id to `id-1`, `id-2`, ... ordered by
/// origin file name, skipping suffixes that are already taken. The result is
/// sorted by id. A resource whose document cannot be renamed is dropped.
pub fn unique_ids(resources: Vec<Resource>, branch: &Branch) -> Vec<Resource> {
    let mut groups: BTreeMap<String, Vec<Resource>> = BTreeMap::new();
    for resource in resources {
        groups.entry(resource.id.clone()).or_default().push(resource);
    }
    let mut taken: BTreeSet<String> = groups.keys().cloned().collect();

    let mut duplicate_groups = 0;
    let mut unique = Vec::new();
    for (id, mut group) in groups {
        if group.len() == 1 {
            unique.append(&mut group);
            continue;
        }

        duplicate_groups += 1;
        debug!(branch = %branch.name, "Found {} resources with the same name: {}", group.len(), id);
        group.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        let mut suffix = 0;
        for mut resource in group {
            let new_id = loop {
                suffix += 1;
                let candidate = format!("{}-{}", id, suffix);
                if !taken.contains(&candidate) {
                    break candidate;
                }
            };
            match resource.set_id(&new_id) {
                Ok(()) => {
                    taken.insert(new_id);
                    unique.push(resource);
                }
                Err(err) => error!(
                    branch = %branch.name,
                    error = %err,
                    "Dropping {}: failed to rename it to {}",
                    resource.long_name(),
                    new_id
                ),
            }
        }
    }

    unique.sort_by(|a, b| a.id.cmp(&b.id));

    if duplicate_groups > 0 {
        info!(
            branch = %branch.name,
            "Found {} duplicate application names. Suffixing with -1, -2, -3, etc.",
            duplicate_groups
        );
    }
    unique
}

/// Drop resources that are identical in both branches.
///
/// A pair matches when ids are equal and documents are structurally equal;
/// both sides of every matching pair are removed.
pub fn remove_duplicate_resources(
    base: Vec<Resource>,
    target: Vec<Resource>,
) -> (Vec<Resource>, Vec<Resource>) {
    let is_duplicate = |resource: &Resource, others: &[Resource]| {
        others.iter().any(|o| o.id == resource.id && o.document == resource.document)
    };

    let base_dupes: Vec<bool> = base.iter().map(|r| is_duplicate(r, &target)).collect();
    let target_dupes: Vec<bool> = target.iter().map(|r| is_duplicate(r, &base)).collect();
    let skipped = base_dupes.iter().filter(|d| **d).count();

    let keep = |resources: Vec<Resource>, dupes: Vec<bool>| -> Vec<Resource> {
        resources
            .into_iter()
            .zip(dupes)
            .filter_map(|(r, dup)| {
                if dup {
                    debug!("Skipping {} because it has not changed", r.long_name());
                    None
                } else {
                    Some(r)
                }
            })
            .collect()
    };

    let base = keep(base, base_dupes);
    let target = keep(target, target_dupes);

    if skipped > 0 {
        info!("Skipped {} Application[Sets] because they have not changed after patching", skipped);
        info!("Using the remaining {} base and {} target Application[Sets]", base.len(), target.len());
    }
    (base, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::domain::BranchType;

    fn resource(name: &str, file: &str, extra: &str, branch: BranchType) -> Resource {
        let yaml = format!("kind: Application\nmetadata:\n  name: {name}\nspec:\n  extra: {extra}\n");
        let doc = Document::from_yaml(&yaml).expect("valid yaml");
        Resource::from_document(doc, file, branch).expect("resource")
    }

    fn base_branch() -> Branch {
        Branch::new("main", BranchType::Base, "/tmp/base")
    }

    #[test]
    fn test_unique_ids_suffix_by_file_name() {
        let resources = vec![
            resource("app", "c.yaml", "1", BranchType::Base),
            resource("other", "z.yaml", "1", BranchType::Base),
            resource("app", "a.yaml", "2", BranchType::Base),
            resource("app", "b.yaml", "3", BranchType::Base),
        ];
        let unique = unique_ids(resources, &base_branch());

        assert_eq!(unique.len(), 4);
        let summary: Vec<(&str, &str)> =
            unique.iter().map(|r| (r.id.as_str(), r.file_name.as_str())).collect();
        assert_eq!(
            summary,
            vec![("app-1", "a.yaml"), ("app-2", "b.yaml"), ("app-3", "c.yaml"), ("other", "z.yaml")]
        );
        assert_eq!(unique[0].document.name(), Some("app-1"));
        assert_eq!(unique[0].name, "app");
    }

    #[test]
    fn test_unique_ids_skips_suffixes_already_in_use() {
        let resources = vec![
            resource("app", "a.yaml", "1", BranchType::Base),
            resource("app", "b.yaml", "2", BranchType::Base),
            resource("app-1", "c.yaml", "3", BranchType::Base),
        ];
        let unique = unique_ids(resources, &base_branch());

        let summary: Vec<(&str, &str)> =
            unique.iter().map(|r| (r.id.as_str(), r.file_name.as_str())).collect();
        assert_eq!(summary, vec![("app-1", "c.yaml"), ("app-2", "a.yaml"), ("app-3", "b.yaml")]);
        for r in &unique {
            assert_eq!(r.document.name(), Some(r.id.as_str()));
        }
    }

    #[test]
    fn test_unique_ids_leaves_distinct_ids_alone() {
        let resources = vec![
            resource("b", "b.yaml", "1", BranchType::Base),
            resource("a", "a.yaml", "1", BranchType::Base),
        ];
        let unique = unique_ids(resources, &base_branch());
        let ids: Vec<&str> = unique.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_remove_duplicates_drops_identical_pairs() {
        let base = vec![
            resource("same", "a.yaml", "1", BranchType::Base),
            resource("changed", "b.yaml", "1", BranchType::Base),
        ];
        let target = vec![
            resource("same", "a.yaml", "1", BranchType::Target),
            resource("changed", "b.yaml", "2", BranchType::Target),
            resource("new", "c.yaml", "1", BranchType::Target),
        ];
        let (base, target) = remove_duplicate_resources(base, target);

        let ids = |rs: &[Resource]| rs.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&base), vec!["changed"]);
        assert_eq!(ids(&target), vec!["changed", "new"]);
    }

    #[test]
    fn test_duplicate_comparison_ignores_key_order() {
        let a = Document::from_yaml("kind: Application\nmetadata: {name: x}\nspec: {a: 1, b: 2}\n").unwrap();
        let b = Document::from_yaml("spec: {b: 2, a: 1}\nmetadata: {name: x}\nkind: Application\n").unwrap();
        let base = Resource::from_document(a, "x.yaml", BranchType::Base).unwrap();
        let target = Resource::from_document(b, "x.yaml", BranchType::Target).unwrap();
        let (base, target) = remove_duplicate_resources(vec![base], vec![target]);
        assert!(base.is_empty() && target.is_empty());
    }
}
