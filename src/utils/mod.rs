//! Small shared helpers

pub mod hashing;
pub mod paths;

pub use hashing::{file_sha256, sha256_hex};
pub use paths::{clean_path, normalize_path};
