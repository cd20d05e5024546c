//! Integrity verification
//!
//! Streaming SHA-256 over files on disk. Errors opening or reading the file
//! propagate; a caller must never read them as "verified".

use crate::error::{LaunchpadError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const CHUNK_SIZE: usize = 8192;

/// Lowercase hex SHA-256 of the file contents
pub fn digest(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| LaunchpadError::filesystem(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| LaunchpadError::filesystem(path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Case-insensitive comparison against an expected hex digest
pub fn verify(path: &Path, expected_hex: &str) -> Result<bool> {
    let actual = digest(path)?;
    Ok(actual.eq_ignore_ascii_case(expected_hex.trim()))
}

/// Like `verify`, but a mismatch is an `Integrity` error carrying both digests
pub fn ensure_matches(path: &Path, expected_hex: &str) -> Result<()> {
    let actual = digest(path)?;
    if actual.eq_ignore_ascii_case(expected_hex.trim()) {
        Ok(())
    } else {
        Err(LaunchpadError::Integrity {
            path: path.to_path_buf(),
            expected: expected_hex.trim().to_ascii_lowercase(),
            actual,
        })
    }
}
