//! `prepare` command

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use super::utils::{flag, parse_csv};
use crate::config::{load_config, merge_cli_with_config, CliOverrides};
use crate::domain::{Branch, BranchType};
use crate::expand::{AppSetExpander, CommandExpander, ExpandOptions};
use crate::pipeline::{prepare_branches, PipelineOptions};
use crate::resource::resources_to_string;
use crate::scan::list_changed_files;

#[derive(Args)]
pub struct PrepareArgs {
    /// Base branch name
    #[arg(short = 'b', long, value_name = "BRANCH", env = "BASE_BRANCH")]
    pub base_branch: Option<String>,

    /// Target branch name
    #[arg(short = 't', long, value_name = "BRANCH", env = "TARGET_BRANCH")]
    pub target_branch: Option<String>,

    /// Checkout of the base branch
    #[arg(long, value_name = "DIR", default_value = "base-branch")]
    pub base_dir: PathBuf,

    /// Checkout of the target branch
    #[arg(long, value_name = "DIR", default_value = "target-branch")]
    pub target_dir: PathBuf,

    /// Repository under review (e.g. org/repo)
    #[arg(long, value_name = "REPO", env = "REPO")]
    pub repo: Option<String>,

    /// Namespace the sandbox operator runs in
    #[arg(long, value_name = "NAMESPACE")]
    pub argocd_namespace: Option<String>,

    /// Where base.yaml and target.yaml are written
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_folder: Option<PathBuf>,

    /// Path to config file (argocd-diff-preview.toml or .yaml)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only scan files whose relative path matches this regex
    #[arg(short = 'r', long, value_name = "REGEX")]
    pub file_regex: Option<String>,

    /// Label selectors (e.g. team=a,tier!=db)
    #[arg(short = 'l', long, value_name = "SELECTORS")]
    pub selector: Option<String>,

    /// Changed files (comma-separated)
    #[arg(long, value_name = "FILES", conflicts_with = "auto_detect_files_changed")]
    pub files_changed: Option<String>,

    /// Compute changed files by comparing the two checkouts
    #[arg(long)]
    pub auto_detect_files_changed: bool,

    /// Render Applications that declare no watch annotations when files changed
    #[arg(long)]
    pub watch_if_no_watch_pattern_found: bool,

    /// Skip invalid watch-pattern regexes instead of rejecting the Application
    #[arg(long)]
    pub ignore_invalid_watch_pattern: bool,

    /// Only redirect sources currently at these revisions (comma-separated)
    #[arg(long, value_name = "REVISIONS")]
    pub redirect_target_revisions: Option<String>,

    /// Command expanding an ApplicationSet file (e.g. "argocd appset generate -o yaml")
    #[arg(long, value_name = "COMMAND")]
    pub appset_command: Option<String>,

    /// Keep the scratch files written for ApplicationSet expansion
    #[arg(long)]
    pub keep_scratch_files: bool,
}

pub fn run(args: PrepareArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let file_config = load_config(&cwd, args.config.as_deref())?;

    let files_changed = if args.auto_detect_files_changed {
        let (files, took) = list_changed_files(&args.base_dir, &args.target_dir)
            .context("Failed to detect changed files")?;
        tracing::info!("Found {} changed files in {}ms", files.len(), took.as_millis());
        Some(files)
    } else {
        parse_csv(args.files_changed.as_deref())
    };

    let config = merge_cli_with_config(
        file_config,
        CliOverrides {
            base_branch: args.base_branch,
            target_branch: args.target_branch,
            repo: args.repo,
            argocd_namespace: args.argocd_namespace,
            output_folder: args.output_folder,
            file_regex: args.file_regex,
            selector: args.selector,
            files_changed,
            watch_if_no_watch_pattern_found: flag(args.watch_if_no_watch_pattern_found),
            ignore_invalid_watch_pattern: flag(args.ignore_invalid_watch_pattern),
            redirect_target_revisions: parse_csv(args.redirect_target_revisions.as_deref()),
            appset_command: args.appset_command,
            keep_scratch_files: flag(args.keep_scratch_files),
            ..CliOverrides::default()
        },
    );

    let Some(target_branch) = config.target_branch.clone() else {
        anyhow::bail!("A target branch is required (--target-branch or target_branch in the config file)");
    };
    if config.repo.is_none() {
        tracing::warn!("No repository given; sources of every repository will be redirected");
    }

    let base = Branch::new(&config.base_branch, BranchType::Base, &args.base_dir);
    let target = Branch::new(target_branch, BranchType::Target, &args.target_dir);

    let scratch_dir = config.output_folder.join("tmp");
    let options = PipelineOptions {
        filter: config.filter_options()?,
        patch: config.patch_options(),
        expand: ExpandOptions {
            scratch_dir,
            max_attempts: config.expansion_retries,
            retry_delay: Duration::from_secs(1),
            keep_scratch_files: config.keep_scratch_files,
        },
    };

    let expander = config.appset_command.as_deref().and_then(CommandExpander::from_command_line);
    let prepared = prepare_branches(&base, &target, expander.as_ref().map(|e| e as &dyn AppSetExpander), &options)?;

    fs::create_dir_all(&config.output_folder)
        .with_context(|| format!("Failed to create {}", config.output_folder.display()))?;
    for (branch, resources) in [(&base, &prepared.base), (&target, &prepared.target)] {
        let path = config.output_folder.join(format!("{}.yaml", branch.branch_type));
        fs::write(&path, resources_to_string(resources))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{}: {} Application[Sets] -> {}", branch.name, resources.len(), path.display());
    }

    if prepared.is_empty() {
        println!("No changes found");
    }
    Ok(())
}
