//! Core domain types shared across the pipeline stages

pub mod branch;
pub mod kind;
pub mod options;
pub mod selector;

pub use branch::{Branch, BranchType};
pub use kind::ResourceKind;
pub use options::FilterOptions;
pub use selector::{Operator, Selector};
