//! Normalisation of rendered manifests before diffing

use super::ignore_differences::{apply_rules, parse_rules};
use crate::document::{remove_key, Document};
use crate::error::Result;
use crate::resource::Resource;
use std::cmp::Ordering;
use tracing::debug;

/// Annotation the controller stamps on every resource it renders.
pub const TRACKING_ID_ANNOTATION: &str = "argocd.argoproj.io/tracking-id";

const CRD_KIND: &str = "CustomResourceDefinition";

/// Built-in and widely installed kinds that are not namespaced.
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "APIService",
    "CSIDriver",
    "CSINode",
    "CertificateSigningRequest",
    "ClusterIssuer",
    "ClusterRole",
    "ClusterRoleBinding",
    "ComponentStatus",
    "CustomResourceDefinition",
    "FlowSchema",
    "IngressClass",
    "MutatingWebhookConfiguration",
    "Namespace",
    "Node",
    "PersistentVolume",
    "PodSecurityPolicy",
    "PriorityClass",
    "PriorityLevelConfiguration",
    "RuntimeClass",
    "StorageClass",
    "ValidatingAdmissionPolicy",
    "ValidatingAdmissionPolicyBinding",
    "ValidatingWebhookConfiguration",
    "VolumeAttachment",
    "VolumeSnapshotClass",
];

pub fn is_cluster_scoped(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}

/// Split a raw multi-document dump into manifests.
///
/// Blank documents are dropped silently, documents without `apiVersion` or
/// `kind` with a debug log. A document that is not valid YAML fails the
/// whole dump.
pub fn parse_manifest_dump(raw: &str) -> Result<Vec<Document>> {
    let mut manifests = Vec::new();
    for chunk in split_documents(raw) {
        if chunk.trim().is_empty() {
            continue;
        }
        let document = Document::from_yaml(&chunk)?;
        if !document.is_object() {
            continue;
        }
        if document.api_version().is_none() || document.kind().is_none() {
            debug!("Skipping manifest without apiVersion or kind");
            continue;
        }
        manifests.push(document);
    }
    Ok(manifests)
}

fn split_documents(raw: &str) -> Vec<String> {
    let mut chunks = vec![String::new()];
    for line in raw.lines() {
        if line.trim_end() == "---" {
            chunks.push(String::new());
            continue;
        }
        if let Some(current) = chunks.last_mut() {
            current.push_str(line);
            current.push('\n');
        }
    }
    chunks
}

/// Remove the tracking-id annotation, and the annotation map if that leaves it empty.
pub fn strip_tracking_id(manifest: &mut Document) {
    let Some(annotations) = manifest
        .get_mut(&["metadata", "annotations"])
        .and_then(|v| v.as_mapping_mut())
    else {
        return;
    };
    remove_key(annotations, TRACKING_ID_ANNOTATION);
    if annotations.is_empty() {
        if let Some(metadata) = manifest.get_mut(&["metadata"]).and_then(|v| v.as_mapping_mut()) {
            remove_key(metadata, "annotations");
        }
    }
}

/// Clear the namespace of cluster-scoped manifests; fill in
/// `destination_namespace` on namespaced ones that lack one.
pub fn normalize_namespace(manifest: &mut Document, destination_namespace: Option<&str>) {
    let Some(kind) = manifest.kind() else {
        return;
    };
    if is_cluster_scoped(kind) {
        if let Some(metadata) = manifest.get_mut(&["metadata"]).and_then(|v| v.as_mapping_mut()) {
            remove_key(metadata, "namespace");
        }
        return;
    }
    if manifest.namespace().is_some() {
        return;
    }
    if let Some(namespace) = destination_namespace.filter(|ns| !ns.is_empty()) {
        if let Err(err) = manifest.set_namespace(namespace) {
            debug!(error = %err, "Could not set namespace on manifest");
        }
    }
}

fn sort_key(manifest: &Document) -> (bool, &str, &str, &str, &str) {
    let kind = manifest.kind().unwrap_or_default();
    (
        kind == CRD_KIND,
        manifest.api_version().unwrap_or_default(),
        kind,
        manifest.namespace().unwrap_or_default(),
        manifest.name().unwrap_or_default(),
    )
}

fn compare_manifests(a: &Document, b: &Document) -> Ordering {
    sort_key(a).cmp(&sort_key(b))
}

/// Stable order: apiVersion, kind, namespace, name, with
/// CustomResourceDefinitions always last.
pub fn sort_manifests(manifests: &mut [Document]) {
    manifests.sort_by(compare_manifests);
}

/// The namespace an Application deploys into, if it declares one.
pub fn destination_namespace(app: &Resource) -> Option<&str> {
    let mut path = app.kind.spec_path().to_vec();
    path.extend(["destination", "namespace"]);
    app.document.get_str(&path).filter(|ns| !ns.is_empty())
}

/// Apply every normalisation step to the manifests rendered for `app`.
/// Without an owning Application only the app-independent steps run.
pub fn normalize_manifests(mut manifests: Vec<Document>, app: Option<&Resource>) -> Vec<Document> {
    let rules = app.map(parse_rules).unwrap_or_default();
    let namespace = app.and_then(destination_namespace);

    for manifest in manifests.iter_mut() {
        strip_tracking_id(manifest);
        normalize_namespace(manifest, namespace);
    }
    apply_rules(&mut manifests, &rules);
    sort_manifests(&mut manifests);
    manifests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BranchType;

    fn doc(yaml: &str) -> Document {
        Document::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_parse_manifest_dump() {
        let raw = "---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\ndata:\n  cert: |\n    -----BEGIN CERT-----\n    abc\n---\n\n---\nfoo: bar\n---\napiVersion: v1\nkind: Service\nmetadata:\n  name: b\n";
        let manifests = parse_manifest_dump(raw).unwrap();
        assert_eq!(manifests.len(), 2);
        assert!(manifests[0].get_str(&["data", "cert"]).unwrap().contains("-----BEGIN CERT-----"));
        assert_eq!(manifests[1].kind(), Some("Service"));
    }

    #[test]
    fn test_parse_manifest_dump_rejects_invalid_yaml() {
        assert!(parse_manifest_dump("apiVersion: v1\nkind: [unclosed\n").is_err());
    }

    #[test]
    fn test_strip_tracking_id() {
        let mut only = doc("metadata:\n  name: a\n  annotations:\n    argocd.argoproj.io/tracking-id: app:/ConfigMap:ns/a\n");
        strip_tracking_id(&mut only);
        assert!(only.get(&["metadata", "annotations"]).is_none());

        let mut mixed = doc("metadata:\n  annotations:\n    argocd.argoproj.io/tracking-id: x\n    keep: y\n");
        strip_tracking_id(&mut mixed);
        assert_eq!(mixed.annotations().len(), 1);
        assert_eq!(mixed.get_str(&["metadata", "annotations", "keep"]), Some("y"));
    }

    #[test]
    fn test_normalize_namespace() {
        let mut ns = doc("apiVersion: v1\nkind: Namespace\nmetadata:\n  name: prod\n  namespace: prod\n");
        normalize_namespace(&mut ns, Some("other"));
        assert_eq!(ns.namespace(), None);

        let mut cm = doc("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n");
        normalize_namespace(&mut cm, Some("dest"));
        assert_eq!(cm.namespace(), Some("dest"));

        let mut explicit = doc("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n  namespace: mine\n");
        normalize_namespace(&mut explicit, Some("dest"));
        assert_eq!(explicit.namespace(), Some("mine"));
    }

    #[test]
    fn test_sort_puts_crds_last() {
        let mut manifests = vec![
            doc("apiVersion: apiextensions.k8s.io/v1\nkind: CustomResourceDefinition\nmetadata:\n  name: a\n"),
            doc("apiVersion: v1\nkind: Service\nmetadata:\n  name: b\n"),
            doc("apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: z\n"),
            doc("apiVersion: v1\nkind: Service\nmetadata:\n  name: a\n  namespace: x\n"),
            doc("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: c\n"),
        ];
        sort_manifests(&mut manifests);
        let order: Vec<(&str, &str)> = manifests
            .iter()
            .map(|m| (m.kind().unwrap(), m.name().unwrap()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Deployment", "z"),
                ("ConfigMap", "c"),
                ("Service", "b"),
                ("Service", "a"),
                ("CustomResourceDefinition", "a"),
            ]
        );
    }

    #[test]
    fn test_normalize_manifests_with_app() {
        let app = Resource::from_document(
            doc("apiVersion: argoproj.io/v1alpha1\nkind: Application\nmetadata:\n  name: app1\nspec:\n  destination:\n    namespace: team\n  ignoreDifferences:\n    - kind: Secret\n      jsonPointers: [/data/password]\n"),
            "apps.yaml",
            BranchType::Target,
        )
        .unwrap();
        let manifests = vec![
            doc("apiVersion: v1\nkind: Secret\nmetadata:\n  name: s\n  annotations:\n    argocd.argoproj.io/tracking-id: x\ndata:\n  password: c2VjcmV0\n  user: YWRtaW4=\n"),
            doc("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: c\n"),
        ];

        let out = normalize_manifests(manifests, Some(&app));
        assert_eq!(out[0].kind(), Some("ConfigMap"));
        assert_eq!(out[0].namespace(), Some("team"));
        assert!(out[1].get(&["metadata", "annotations"]).is_none());
        assert!(out[1].get(&["data", "password"]).is_none());
        assert_eq!(out[1].get_str(&["data", "user"]), Some("YWRtaW4="));
    }

    #[test]
    fn test_normalize_manifests_without_app() {
        let manifests = vec![doc("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: c\n  annotations:\n    argocd.argoproj.io/tracking-id: x\n")];
        let out = normalize_manifests(manifests, None);
        assert!(out[0].get(&["metadata", "annotations"]).is_none());
        assert_eq!(out[0].namespace(), None);
    }
}
