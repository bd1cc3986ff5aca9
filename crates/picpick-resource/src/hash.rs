//! Content digests
//!
//! [`ContentHash`] is the Blake3 digest reported for every built archive, so
//! a written file can be checked against the build that produced it.

use std::fmt::{self, Display, Formatter};

/// A 32-byte content hash (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute the Blake3 hash of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_is_deterministic() {
        assert_eq!(ContentHash::compute(b"pixels"), ContentHash::compute(b"pixels"));
        assert_ne!(ContentHash::compute(b"pixels"), ContentHash::compute(b"other"));
    }

    #[test]
    fn display_is_full_hex() {
        let hash = ContentHash::compute(b"archive");
        let text = hash.to_string();
        assert_eq!(text.len(), 64);
        assert!(text.starts_with(&hash.short()));
        assert_eq!(hash.short().len(), 16);
    }

    #[test]
    fn matches_blake3_reference() {
        // BLAKE3 of the empty input
        assert_eq!(
            ContentHash::compute(b"").to_string(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }
}
