//! `changed-files` command

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::scan::list_changed_files;

#[derive(Args)]
pub struct ChangedFilesArgs {
    /// Checkout of the base branch
    #[arg(value_name = "BASE_DIR")]
    pub base: PathBuf,

    /// Checkout of the target branch
    #[arg(value_name = "TARGET_DIR")]
    pub target: PathBuf,

    /// Print the list as a JSON array
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ChangedFilesArgs) -> Result<()> {
    for dir in [&args.base, &args.target] {
        if !dir.is_dir() {
            anyhow::bail!("Not a directory: {}", dir.display());
        }
    }

    let (changed, took) = list_changed_files(&args.base, &args.target)
        .context("Failed to compare branch checkouts")?;
    tracing::info!("Found {} changed files in {}ms", changed.len(), took.as_millis());

    if args.json {
        println!("{}", serde_json::to_string(&changed)?);
        return Ok(());
    }
    for file in changed {
        println!("{file}");
    }
    Ok(())
}
