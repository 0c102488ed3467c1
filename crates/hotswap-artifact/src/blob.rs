//! Artifact blobs and identifiers
//!
//! An [`ArtifactBlob`] is one opaque unit of update. An empty blob means
//! "no artifact" everywhere in the workspace.

use crate::digest::ArtifactDigest;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Immutable artifact bytes
///
/// Backed by a shared slice so blobs can be handed to observers and backends
/// without copying.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ArtifactBlob(Arc<[u8]>);

impl ArtifactBlob {
    /// Create from byte vector
    #[inline]
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self(data.into())
    }

    /// Empty blob
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// Get reference to bytes
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get content length
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Blake3 digest of the content
    #[inline]
    #[must_use]
    pub fn digest(&self) -> ArtifactDigest {
        ArtifactDigest::compute(&self.0)
    }
}

impl fmt::Debug for ArtifactBlob {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactBlob")
            .field("len", &self.len())
            .field("digest", &self.digest().short())
            .finish()
    }
}

impl Default for ArtifactBlob {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<u8>> for ArtifactBlob {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for ArtifactBlob {
    fn from(data: &[u8]) -> Self {
        Self(data.into())
    }
}

impl AsRef<[u8]> for ArtifactBlob {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Identifier resolved from an artifact's internal format
///
/// For class-file artifacts this is the dotted class name
/// (`com.example.Greeter`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ArtifactIdentifier(String);

impl ArtifactIdentifier {
    /// Create new identifier
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Identifier as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ArtifactIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactIdentifier {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ArtifactIdentifier {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for ArtifactIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
