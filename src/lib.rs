//! argocd-diff-preview: render the manifest diff a GitOps pull request would cause
//!
//! The library holds the resource pipeline: discovering Applications and
//! ApplicationSets in two branch checkouts, selecting the ones a change
//! touches, rewriting them for a sandbox cluster, expanding ApplicationSets,
//! and normalising what the sandbox renders so the two branches can be diffed.

pub mod cli;
pub mod config;
pub mod document;
pub mod domain;
pub mod error;
pub mod expand;
pub mod extract;
pub mod filter;
pub mod patch;
pub mod pipeline;
pub mod resource;
pub mod scan;
pub mod unique;
pub mod utils;

pub use error::{Error, Result};
