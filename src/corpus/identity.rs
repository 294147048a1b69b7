//! Content identity for artifacts.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Content identifier (SHA256 of the raw bytes, lowercase hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentIdentity(String);

impl ContentIdentity {
    /// Compute the identity of a byte sequence
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Read a file fully and compute its identity
    pub fn of_file(path: &Path) -> std::io::Result<(Self, u64)> {
        let bytes = std::fs::read(path)?;
        Ok((Self::of_bytes(&bytes), bytes.len() as u64))
    }

    /// Wrap an already computed hex digest
    pub fn from_hex(hex_digest: &str) -> anyhow::Result<Self> {
        if hex_digest.len() != 64 || !hex_digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            anyhow::bail!("Not a SHA256 hex digest: {}", hex_digest);
        }
        Ok(Self(hex_digest.to_ascii_lowercase()))
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log output
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl std::fmt::Display for ContentIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
