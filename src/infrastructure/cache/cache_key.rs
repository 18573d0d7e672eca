//! Cache key derivation for file-like inputs.

use sha2::{Digest, Sha256};

use crate::domain::entities::ImageInput;

/// Fingerprint of an input's (name, byte length, last-modified) triple.
///
/// Two inputs with the same triple map to the same key even if their bytes
/// differ. File contents are never read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives a key from the identifying metadata of a file.
    #[must_use]
    pub fn derive(name: &str, size: u64, last_modified: u64) -> Self {
        let mut hasher = Sha256::new();
        // The two fixed-width integers trail the name, so the split point
        // is recoverable from the total length and no separator is needed.
        hasher.update(name.as_bytes());
        hasher.update(size.to_le_bytes());
        hasher.update(last_modified.to_le_bytes());
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..16]))
    }

    /// Derives the key for an input.
    #[must_use]
    pub fn for_input(input: &ImageInput) -> Self {
        Self::derive(input.name(), input.size(), input.last_modified())
    }

    /// The key as lowercase hex.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&ImageInput> for CacheKey {
    fn from(input: &ImageInput) -> Self {
        Self::for_input(input)
    }
}
