//! Integration tests for CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const REPO_URL: &str = "https://github.com/org/repo.git";

fn bin() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("argocd-diff-preview"));
    for var in ["BASE_BRANCH", "TARGET_BRANCH", "REPO", "RUST_LOG"] {
        cmd.env_remove(var);
    }
    cmd
}

fn app(name: &str, repo_url: &str, path: &str) -> String {
    format!(
        "apiVersion: argoproj.io/v1alpha1\nkind: Application\nmetadata:\n  name: {name}\n  namespace: team\n\
         spec:\n  project: team\n  destination:\n    name: prod\n    namespace: {name}\n\
         \x20 source:\n    repoURL: {repo_url}\n    path: {path}\n    targetRevision: HEAD\n\
         \x20 syncPolicy:\n    automated: {{}}\n"
    )
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

#[test]
fn test_cli_version() {
    bin().arg("--version").assert().success().stdout(predicate::str::contains("argocd-diff-preview"));
}

#[test]
fn test_cli_help() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("prepare"))
        .stdout(predicate::str::contains("changed-files"))
        .stdout(predicate::str::contains("normalize"));
}

#[test]
fn test_prepare_requires_target_branch() {
    let tmp = TempDir::new().expect("tmp");
    bin()
        .current_dir(tmp.path())
        .arg("prepare")
        .assert()
        .failure()
        .stderr(predicate::str::contains("A target branch is required"));
}

#[test]
fn test_prepare_rejects_invalid_selector() {
    let tmp = TempDir::new().expect("tmp");
    fs::create_dir_all(tmp.path().join("base-branch")).expect("mkdir");
    fs::create_dir_all(tmp.path().join("target-branch")).expect("mkdir");
    bin()
        .current_dir(tmp.path())
        .args(["prepare", "-t", "feature", "-l", "team"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid label selector"));
}

#[test]
fn test_prepare_writes_changed_applications() {
    let tmp = TempDir::new().expect("tmp");
    let root = tmp.path();
    // app1 points at another repository, so patching leaves it identical on both sides
    write(root, "base-branch/apps/a.yaml", &app("app1", "https://github.com/org/platform.git", "charts/one"));
    write(root, "base-branch/apps/b.yaml", &app("app2", REPO_URL, "charts/two"));
    write(root, "target-branch/apps/a.yaml", &app("app1", "https://github.com/org/platform.git", "charts/one"));
    write(root, "target-branch/apps/b.yaml", &app("app2", REPO_URL, "charts/two-v2"));

    bin()
        .current_dir(root)
        .args(["prepare", "-t", "feature", "--repo", "org/repo", "-o", "out"])
        .assert()
        .success()
        .stdout(predicate::str::contains("main: 1 Application[Sets]"))
        .stdout(predicate::str::contains("feature: 1 Application[Sets]"));

    let target = fs::read_to_string(root.join("out/target.yaml")).expect("target.yaml");
    assert!(target.contains("# File: apps/b.yaml"));
    assert!(target.contains("name: app2"));
    assert!(!target.contains("name: app1"));
    assert!(target.contains("targetRevision: feature"));
    assert!(target.contains("server: https://kubernetes.default.svc"));
    assert!(target.contains("namespace: argocd"));
    assert!(!target.contains("syncPolicy"));

    let base = fs::read_to_string(root.join("out/base.yaml")).expect("base.yaml");
    assert!(base.contains("targetRevision: main"));
}

#[test]
fn test_prepare_reads_config_file() {
    let tmp = TempDir::new().expect("tmp");
    let root = tmp.path();
    write(root, "base-branch/apps/a.yaml", &app("app1", REPO_URL, "charts/one"));
    write(root, "target-branch/apps/a.yaml", &app("app1", REPO_URL, "charts/one-v2"));
    write(root, "argocd-diff-preview.toml", "target_branch = 'from-config'\nargocd_namespace = 'gitops'\n");

    bin().current_dir(root).arg("prepare").assert().success();

    let target = fs::read_to_string(root.join("output/target.yaml")).expect("target.yaml");
    assert!(target.contains("targetRevision: from-config"));
    assert!(target.contains("namespace: gitops"));
}

#[test]
fn test_changed_files_lists_differences() {
    let tmp = TempDir::new().expect("tmp");
    let root = tmp.path();
    write(root, "base/same.yaml", "a: 1\n");
    write(root, "target/same.yaml", "a: 1\n");
    write(root, "base/changed.yaml", "a: 1\n");
    write(root, "target/changed.yaml", "a: 2\n");
    write(root, "target/new/file.yaml", "a: 3\n");

    bin()
        .args(["changed-files"])
        .arg(root.join("base"))
        .arg(root.join("target"))
        .assert()
        .success()
        .stdout("changed.yaml\nnew/file.yaml\n");
}

#[test]
fn test_changed_files_json_output() {
    let tmp = TempDir::new().expect("tmp");
    let root = tmp.path();
    write(root, "base/a.yaml", "a: 1\n");
    write(root, "target/a.yaml", "a: 2\n");

    let output = bin()
        .args(["changed-files", "--json"])
        .arg(root.join("base"))
        .arg(root.join("target"))
        .output()
        .expect("run");
    assert!(output.status.success());
    let files: Vec<String> = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(files, vec!["a.yaml"]);
}

#[test]
fn test_changed_files_rejects_missing_dir() {
    let tmp = TempDir::new().expect("tmp");
    bin()
        .args(["changed-files"])
        .arg(tmp.path().join("missing"))
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not a directory"));
}

#[test]
fn test_normalize_strips_masks_and_hides() {
    let tmp = TempDir::new().expect("tmp");
    let root = tmp.path();
    write(
        root,
        "app.yaml",
        "apiVersion: argoproj.io/v1alpha1\nkind: Application\nmetadata:\n  name: pr-t-app1\n\
         spec:\n  destination:\n    namespace: team\n  ignoreDifferences:\n    - kind: ConfigMap\n      jsonPointers: [/data/noisy]\n",
    );
    write(
        root,
        "dump.yaml",
        "apiVersion: v1\nkind: Secret\nmetadata:\n  name: creds\n---\n\
         apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: pr-t-app1-config\n  annotations:\n    argocd.argoproj.io/tracking-id: pr-t-app1:/ConfigMap:team/x\n\
         data:\n  noisy: \"1\"\n  kept: \"2\"\n",
    );

    bin()
        .current_dir(root)
        .args(["normalize", "--manifests", "dump.yaml", "--app", "app.yaml", "--prefix", "pr"])
        .args(["--hide-resources", ":Secret:*"])
        .assert()
        .success()
        .stdout(predicate::str::contains("name: app1-config"))
        .stdout(predicate::str::contains("namespace: team"))
        .stdout(predicate::str::contains("kept: '2'"))
        .stdout(predicate::str::contains("Skipping manifest v1/Secret/creds"))
        .stdout(predicate::str::contains("tracking-id").not())
        .stdout(predicate::str::contains("noisy").not());
}

#[test]
fn test_normalize_uses_config_hidden_rules_and_jq_paths() {
    let tmp = TempDir::new().expect("tmp");
    let root = tmp.path();
    write(root, "argocd-diff-preview.toml", "hide_resources = ':Secret:*'\n");
    write(
        root,
        "app.yaml",
        "apiVersion: argoproj.io/v1alpha1\nkind: Application\nmetadata:\n  name: app1\n\
         spec:\n  ignoreDifferences:\n    - group: apps\n      kind: Deployment\n      jqPathExpressions: ['.spec.template.spec.containers[].image']\n",
    );
    write(
        root,
        "dump.yaml",
        "apiVersion: v1\nkind: Secret\nmetadata:\n  name: creds\n---\n\
         apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n\
         spec:\n  template:\n    spec:\n      containers:\n        - name: web\n          image: nginx:1.27\n",
    );

    bin()
        .current_dir(root)
        .args(["normalize", "--manifests", "dump.yaml", "--app", "app.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Skipping manifest v1/Secret/creds"))
        .stdout(predicate::str::contains("name: web"))
        .stdout(predicate::str::contains("nginx").not());
}
