use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn sha256_hex_reader(mut reader: impl Read) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0_u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn verify_sha256(bytes: &[u8], expected_hex: &str) -> bool {
    sha256_hex(bytes).eq_ignore_ascii_case(expected_hex.trim())
}

/// Hashes `path` and compares against `expected_hex`.
///
/// Returns the actual digest so callers can report a mismatch.
pub fn verify_sha256_file(path: &Path, expected_hex: &str) -> Result<(bool, String)> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let actual =
        sha256_hex_reader(file).with_context(|| format!("failed to hash {}", path.display()))?;
    let matches = actual.eq_ignore_ascii_case(expected_hex.trim());
    Ok((matches, actual))
}
