//! argocd-diff-preview command-line entry point

use anyhow::Result;

fn main() -> Result<()> {
    argocd_diff_preview::cli::run()
}
