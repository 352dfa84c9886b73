//! Branch identity

use std::fmt;
use std::path::{Path, PathBuf};

/// Which side of the comparison a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BranchType {
    Base,
    Target,
}

impl BranchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchType::Base => "base",
            BranchType::Target => "target",
        }
    }

    /// One-letter tag used when prefixing Application names in the sandbox.
    pub fn short_name(&self) -> &'static str {
        match self {
            BranchType::Base => "b",
            BranchType::Target => "t",
        }
    }
}

impl fmt::Display for BranchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A checked-out branch: its git name and the directory holding its tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub branch_type: BranchType,
    root: PathBuf,
}

impl Branch {
    pub fn new(name: impl Into<String>, branch_type: BranchType, root: impl Into<PathBuf>) -> Self {
        Self { name: name.into(), branch_type, root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
