//! `normalize` command

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use super::utils::read_file;
use crate::config::{load_config, merge_cli_with_config, CliOverrides};
use crate::domain::BranchType;
use crate::extract::{
    normalize_manifests, parse_manifest_dump, remove_prefix, replace_id_in_manifests, ExtractedApp,
};
use crate::resource::Resource;
use crate::scan::parse_documents;

#[derive(Args)]
pub struct NormalizeArgs {
    /// Raw multi-document manifest dump rendered for one Application
    #[arg(short, long, value_name = "FILE")]
    pub manifests: PathBuf,

    /// The Application that owns the manifests (for ignoreDifferences and
    /// the destination namespace)
    #[arg(short, long, value_name = "FILE")]
    pub app: Option<PathBuf>,

    /// Sandbox prefix to strip from the Application name and the manifests
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Replace matching manifests with a placeholder (group:kind:name, comma-separated)
    #[arg(long, value_name = "RULES")]
    pub hide_resources: Option<String>,

    /// Path to config file (argocd-diff-preview.toml or .yaml)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

fn load_app(path: &Path) -> Result<Resource> {
    let content = read_file(path)?;
    let file_name = path.to_string_lossy();
    parse_documents(&file_name, &content)
        .into_iter()
        .find_map(|doc| Resource::from_document(doc, &file_name, BranchType::Target))
        .with_context(|| format!("No Application found in {}", path.display()))
}

pub fn run(args: NormalizeArgs) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = merge_cli_with_config(
        load_config(&cwd, args.config.as_deref())?,
        CliOverrides { hide_resources: args.hide_resources, ..CliOverrides::default() },
    );
    let hidden = config.hidden_rules()?;

    let raw = read_file(&args.manifests)?;
    let mut manifests = parse_manifest_dump(&raw)
        .with_context(|| format!("Failed to parse manifests in {}", args.manifests.display()))?;

    let mut app = args.app.as_deref().map(load_app).transpose()?;
    if let (Some(prefix), Some(app)) = (args.prefix.as_deref(), app.as_mut()) {
        let original = remove_prefix(&app.id, prefix);
        replace_id_in_manifests(&mut manifests, &app.id, &original);
        app.set_id(original)?;
    }

    let manifests = normalize_manifests(manifests, app.as_ref());
    let mut extracted = match &app {
        Some(app) => ExtractedApp::new(app, manifests),
        None => ExtractedApp {
            id: String::new(),
            name: String::new(),
            source_path: args.manifests.to_string_lossy().into_owned(),
            branch: BranchType::Target,
            manifests,
        },
    };

    tracing::info!("Normalised {} manifests", extracted.manifests.len());
    print!("{}", extracted.flatten(&hidden));
    Ok(())
}
