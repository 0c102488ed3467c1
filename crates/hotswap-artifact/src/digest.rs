//! Content digests for artifact blobs

use std::fmt::{self, Display, Formatter};

/// Blake3 digest of an artifact's bytes
///
/// Logged next to identifiers so two revisions of the same artifact can be
/// told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactDigest([u8; 32]);

impl ArtifactDigest {
    /// Digest `data`
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// First 16 hex chars, for log lines
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for ArtifactDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_digest() {
        let d1 = ArtifactDigest::compute(b"class bytes");
        assert_eq!(d1, ArtifactDigest::compute(b"class bytes"));
        assert_ne!(d1, ArtifactDigest::compute(b"other bytes"));
    }

    #[test]
    fn short_form_prefixes_full_hex() {
        let digest = ArtifactDigest::compute(b"test");
        let short = digest.short();
        assert_eq!(short.len(), 16);
        assert_eq!(digest.to_string().len(), 64);
        assert!(digest.to_string().starts_with(&short));
    }
}
