//! Hotswap Artifact Primitives
//!
//! Opaque update artifacts and the addressing types around them.
//!
//! # Core Concepts
//!
//! - [`ArtifactBlob`]: Immutable bytes of one update (empty = no artifact)
//! - [`ArtifactIdentifier`]: Name resolved from a blob's internal format
//! - [`ArtifactDigest`]: 32-byte Blake3 digest for telling revisions apart
//! - [`IdentifierResolver`]: Blob → identifier; [`ClassFileResolver`] for JVM class files
//! - [`NodePath`]: Absolute path of a coordination-tree node
//!
//! # Example
//!
//! ```rust,ignore
//! use hotswap_artifact::{ArtifactBlob, ClassFileResolver, IdentifierResolver};
//!
//! let blob = ArtifactBlob::new(std::fs::read("Greeter.class")?);
//! let id = ClassFileResolver::new().resolve(&blob)?;
//! println!("{id} ({})", blob.digest().short());
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod blob;
mod classfile;
mod digest;
mod path;

// Re-exports
pub use blob::{ArtifactBlob, ArtifactIdentifier};
pub use classfile::{ClassFileResolver, IdentifierResolutionError, IdentifierResolver, CLASS_MAGIC};
pub use digest::ArtifactDigest;
pub use path::{NodePath, PathError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
