//! Apply backends
//!
//! An [`ApplyBackend`] is the opaque mechanism that consumes an artifact and
//! mutates running-process state. It is never called concurrently by this
//! crate; [`ApplyCoordinator`](crate::ApplyCoordinator) holds the process-wide
//! exclusive section around both methods.
//!
//! [`TargetRegistry`] is an in-process backend: artifacts are routed by
//! identifier to registered [`ReloadTarget`]s (plugin reload, hot config swap).

use crate::error::ApplyError;
use dashmap::DashMap;
use hotswap_artifact::{
    ArtifactBlob, ArtifactIdentifier, ClassFileResolver, IdentifierResolutionError,
    IdentifierResolver,
};
use std::sync::Arc;

/// Opaque apply capability
///
/// The coordinator calls [`identify`](Self::identify) and then
/// [`apply`](Self::apply) for every non-empty artifact, inside one exclusive
/// section.
#[cfg_attr(test, mockall::automock)]
pub trait ApplyBackend: Send + Sync {
    /// Extract the identifier of `artifact`
    ///
    /// # Errors
    /// Returns [`IdentifierResolutionError`] for malformed artifacts
    fn identify(&self, artifact: &ArtifactBlob) -> Result<ArtifactIdentifier, IdentifierResolutionError>;

    /// Apply an already identified artifact
    ///
    /// # Errors
    /// Returns [`ApplyError`] on target-not-found or backend failure
    fn apply(&self, identifier: &ArtifactIdentifier, artifact: &ArtifactBlob) -> Result<(), ApplyError>;
}

/// Something in the running process that can take an updated artifact
pub trait ReloadTarget: Send + Sync {
    /// Replace the target's current definition with `artifact`
    ///
    /// # Errors
    /// Any error rejects the update; the previous definition stays active
    fn reload(&self, artifact: &ArtifactBlob) -> anyhow::Result<()>;
}

impl<F> ReloadTarget for F
where
    F: Fn(&ArtifactBlob) -> anyhow::Result<()> + Send + Sync,
{
    fn reload(&self, artifact: &ArtifactBlob) -> anyhow::Result<()> {
        self(artifact)
    }
}

/// Backend that dispatches artifacts to registered reload targets
///
/// Identifiers are resolved with `R` ([`ClassFileResolver`] by default).
pub struct TargetRegistry<R = ClassFileResolver> {
    resolver: R,
    targets: DashMap<ArtifactIdentifier, Arc<dyn ReloadTarget>>,
}

impl TargetRegistry<ClassFileResolver> {
    /// Create registry resolving class-file identifiers
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_resolver(ClassFileResolver::new())
    }
}

impl Default for TargetRegistry<ClassFileResolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: IdentifierResolver> TargetRegistry<R> {
    /// Create registry with a custom identifier resolver
    #[inline]
    #[must_use]
    pub fn with_resolver(resolver: R) -> Self {
        Self {
            resolver,
            targets: DashMap::new(),
        }
    }

    /// Register a target, returning the one it replaced
    pub fn register(
        &self,
        identifier: impl Into<ArtifactIdentifier>,
        target: Arc<dyn ReloadTarget>,
    ) -> Option<Arc<dyn ReloadTarget>> {
        self.targets.insert(identifier.into(), target)
    }

    /// Remove a target
    pub fn unregister(&self, identifier: &ArtifactIdentifier) -> Option<Arc<dyn ReloadTarget>> {
        self.targets.remove(identifier).map(|(_, target)| target)
    }

    /// Check if a target is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, identifier: &ArtifactIdentifier) -> bool {
        self.targets.contains_key(identifier)
    }

    /// Number of registered targets
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl<R: IdentifierResolver> ApplyBackend for TargetRegistry<R> {
    fn identify(&self, artifact: &ArtifactBlob) -> Result<ArtifactIdentifier, IdentifierResolutionError> {
        self.resolver.resolve(artifact)
    }

    fn apply(&self, identifier: &ArtifactIdentifier, artifact: &ArtifactBlob) -> Result<(), ApplyError> {
        // Clone the target out so the shard lock is not held across reload
        let target = self
            .targets
            .get(identifier)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ApplyError::TargetNotFound(identifier.clone()))?;

        tracing::info!("Hot update of [{}] started", identifier);
        target.reload(artifact).map_err(|source| ApplyError::Rejected {
            identifier: identifier.clone(),
            source,
        })?;
        tracing::info!("Hot update of [{}] succeeded", identifier);
        Ok(())
    }
}

impl<R> std::fmt::Debug for TargetRegistry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetRegistry")
            .field("targets", &self.targets.len())
            .finish_non_exhaustive()
    }
}
