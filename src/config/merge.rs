//! Layering CLI flags over file configuration

use super::Config;
use std::path::PathBuf;

/// Values given on the command line. `None` leaves the file value in place.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_branch: Option<String>,
    pub target_branch: Option<String>,
    pub repo: Option<String>,
    pub argocd_namespace: Option<String>,
    pub output_folder: Option<PathBuf>,
    pub file_regex: Option<String>,
    pub selector: Option<String>,
    pub files_changed: Option<Vec<String>>,
    pub watch_if_no_watch_pattern_found: Option<bool>,
    pub ignore_invalid_watch_pattern: Option<bool>,
    pub redirect_target_revisions: Option<Vec<String>>,
    pub hide_resources: Option<String>,
    pub appset_command: Option<String>,
    pub keep_scratch_files: Option<bool>,
}

pub fn merge_cli_with_config(mut config: Config, cli: CliOverrides) -> Config {
    fn apply<T>(slot: &mut T, value: Option<T>) {
        if let Some(v) = value {
            *slot = v;
        }
    }

    apply(&mut config.base_branch, cli.base_branch);
    apply(&mut config.argocd_namespace, cli.argocd_namespace);
    apply(&mut config.output_folder, cli.output_folder);
    apply(&mut config.watch_if_no_watch_pattern_found, cli.watch_if_no_watch_pattern_found);
    apply(&mut config.ignore_invalid_watch_pattern, cli.ignore_invalid_watch_pattern);
    apply(&mut config.redirect_target_revisions, cli.redirect_target_revisions);
    apply(&mut config.keep_scratch_files, cli.keep_scratch_files);

    config.target_branch = cli.target_branch.or(config.target_branch);
    config.repo = cli.repo.or(config.repo);
    config.file_regex = cli.file_regex.or(config.file_regex);
    config.selector = cli.selector.or(config.selector);
    config.files_changed = cli.files_changed.or(config.files_changed);
    config.hide_resources = cli.hide_resources.or(config.hide_resources);
    config.appset_command = cli.appset_command.or(config.appset_command);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_file_values() {
        let file = Config {
            repo: Some("org/from-file".to_string()),
            selector: Some("team=a".to_string()),
            argocd_namespace: "gitops".to_string(),
            ..Config::default()
        };
        let cli = CliOverrides {
            repo: Some("org/from-cli".to_string()),
            keep_scratch_files: Some(true),
            ..CliOverrides::default()
        };

        let merged = merge_cli_with_config(file, cli);
        assert_eq!(merged.repo.as_deref(), Some("org/from-cli"));
        assert_eq!(merged.selector.as_deref(), Some("team=a"));
        assert_eq!(merged.argocd_namespace, "gitops");
        assert!(merged.keep_scratch_files);
    }
}
