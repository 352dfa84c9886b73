//! ApplicationSet generator traversal
//!
//! Generators nest: a `matrix` or `merge` generator owns a list of child
//! generators. The controller accepts at most two children per matrix and at
//! most two levels of nesting below `spec.generators`, so the same limits are
//! enforced here before any git generator is redirected.

use super::RedirectTarget;
use crate::error::{Error, Result};
use serde_yaml::{Mapping, Value};
use tracing::debug;

pub const MAX_NESTING_LEVEL: usize = 2;
pub const MAX_MATRIX_CHILDREN: usize = 2;

/// One entry of a generator list, viewed by its type.
#[derive(Debug)]
pub enum GeneratorNode<'a> {
    Git(&'a mut Mapping),
    Matrix(Option<&'a mut Vec<Value>>),
    Merge(Option<&'a mut Vec<Value>>),
    Other,
}

impl<'a> GeneratorNode<'a> {
    pub fn classify(value: &'a mut Value) -> Self {
        let Some(generator) = value.as_mapping_mut() else {
            return GeneratorNode::Other;
        };
        if generator.contains_key("matrix") {
            return GeneratorNode::Matrix(child_generators(generator.get_mut("matrix")));
        }
        if generator.contains_key("merge") {
            return GeneratorNode::Merge(child_generators(generator.get_mut("merge")));
        }
        match generator.get_mut("git").and_then(Value::as_mapping_mut) {
            Some(git) => GeneratorNode::Git(git),
            None => GeneratorNode::Other,
        }
    }
}

fn child_generators(node: Option<&mut Value>) -> Option<&mut Vec<Value>> {
    node?.as_mapping_mut()?.get_mut("generators")?.as_sequence_mut()
}

/// Walks a generator tree for one ApplicationSet.
pub struct GeneratorWalker<'t> {
    resource: String,
    file: String,
    target: &'t RedirectTarget<'t>,
    redirected: usize,
}

impl<'t> GeneratorWalker<'t> {
    pub fn new(resource: &str, file: &str, target: &'t RedirectTarget<'t>) -> Self {
        Self { resource: resource.to_string(), file: file.to_string(), target, redirected: 0 }
    }

    /// Number of git generator revisions rewritten so far.
    pub fn redirected(&self) -> usize {
        self.redirected
    }

    /// Validate and redirect `generators`, found at `parent`, `level` lists
    /// below `spec.generators`.
    pub fn walk(&mut self, generators: &mut [Value], parent: &str, level: usize) -> Result<()> {
        if level > MAX_NESTING_LEVEL {
            return Err(Error::GeneratorNestingTooDeep {
                resource: self.resource.clone(),
                path: parent.to_string(),
            });
        }

        for (i, generator) in generators.iter_mut().enumerate() {
            match GeneratorNode::classify(generator) {
                GeneratorNode::Matrix(Some(children)) => {
                    debug!(file = %self.file, "Matrix generator found at {}[{}]", parent, i);
                    if children.len() > MAX_MATRIX_CHILDREN {
                        return Err(Error::TooManyMatrixChildren {
                            resource: self.resource.clone(),
                            path: format!("{parent}[{i}].matrix"),
                        });
                    }
                    self.walk(children, &format!("{parent}[{i}].matrix.generators"), level + 1)?;
                }
                GeneratorNode::Merge(Some(children)) => {
                    debug!(file = %self.file, "Merge generator found at {}[{}]", parent, i);
                    self.walk(children, &format!("{parent}[{i}].merge.generators"), level + 1)?;
                }
                GeneratorNode::Git(git) => self.redirect_git(git, parent, i),
                GeneratorNode::Matrix(None) | GeneratorNode::Merge(None) | GeneratorNode::Other => {}
            }
        }

        Ok(())
    }

    fn redirect_git(&mut self, git: &mut Mapping, parent: &str, index: usize) {
        let repo_url = git.get("repoURL").and_then(Value::as_str).unwrap_or("");
        if !self.target.matches_repo(repo_url) {
            debug!(
                file = %self.file,
                "Skipping git generator: {} (repoURL does not match {})",
                repo_url,
                self.target.repo
            );
            return;
        }

        let Some(revision) = git.get("revision").and_then(Value::as_str).map(str::to_string) else {
            return;
        };
        if !self.target.should_redirect(&revision) {
            return;
        }

        git.insert("revision".into(), self.target.branch.into());
        self.redirected += 1;
        debug!(
            file = %self.file,
            "Redirecting revision from {} to {} in {}[{}].git",
            revision,
            self.target.branch,
            parent,
            index
        );
    }
}
