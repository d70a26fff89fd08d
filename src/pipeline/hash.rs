use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to read file for hashing: {0}")]
    Read(#[from] std::io::Error),
}

/// Lowercase hex SHA-256 of a file's bytes. Only ever used as a dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_digest(digest: impl std::fmt::LowerHex) -> Self {
        Self(format!("{digest:x}"))
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash an in-memory buffer.
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash::from_digest(Sha256::digest(bytes))
}

/// Hash everything a reader yields, without buffering it whole.
pub fn hash_reader<R: Read>(mut reader: R) -> Result<ContentHash, HashError> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(ContentHash::from_digest(hasher.finalize()))
}

/// Hash a file on disk.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
    let file = std::fs::File::open(path)?;
    hash_reader(std::io::BufReader::new(file))
}
