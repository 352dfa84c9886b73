//! SHA-256 helpers for change detection and name shortening

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Hash a file's contents without loading it into memory at once.
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_file_hash_matches_content_hash() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("a.yaml");
        std::fs::write(&path, "kind: Application\n").expect("write");
        assert_eq!(file_sha256(&path).expect("hash"), sha256_hex(b"kind: Application\n"));
    }
}
