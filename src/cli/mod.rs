//! Command-line interface for argocd-diff-preview
//!
//! Provides `prepare`, `changed-files` and `normalize` subcommands.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod changed_files;
mod normalize;
mod prepare;
mod utils;

/// Render the manifest diff a GitOps pull request would cause, ahead of merge
#[derive(Parser)]
#[command(name = "argocd-diff-preview")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Select, patch and expand the Applications of both branches
    Prepare(Box<prepare::PrepareArgs>),

    /// List files that differ between two branch checkouts
    ChangedFiles(changed_files::ChangedFilesArgs),

    /// Normalise a raw manifest dump the way extraction does
    Normalize(normalize::NormalizeArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG in the environment always takes precedence; --debug falls back to DEBUG.
    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .try_init();

    let result = match cli.command {
        Commands::Prepare(args) => prepare::run(*args),
        Commands::ChangedFiles(args) => changed_files::run(args),
        Commands::Normalize(args) => normalize::run(args),
    };

    if let Err(err) = &result {
        if let Some(help) = err.downcast_ref::<crate::error::Error>().and_then(|e| e.help_message()) {
            tracing::error!("{}", help);
        }
    }
    result
}
