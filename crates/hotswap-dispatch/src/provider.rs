//! Artifact providers and provider chains
//!
//! A provider produces zero-or-one artifact on demand from any source (local
//! file, network fetch, decryption, in-memory cache). The dispatcher treats
//! it as opaque.

use crate::error::{ConstructionError, ProviderError};
use hotswap_artifact::ArtifactBlob;
use std::fmt;
use std::sync::Arc;

/// Produces an artifact on demand
pub trait ArtifactProvider: Send + Sync {
    /// Produce the current artifact, or `None` when there is nothing to apply
    ///
    /// # Errors
    /// Returns [`ProviderError`] if the source cannot be read
    fn produce(&self) -> Result<Option<ArtifactBlob>, ProviderError>;
}

impl<F> ArtifactProvider for F
where
    F: Fn() -> Result<Option<ArtifactBlob>, ProviderError> + Send + Sync,
{
    fn produce(&self) -> Result<Option<ArtifactBlob>, ProviderError> {
        self()
    }
}

/// Provider that always yields the same bytes
#[derive(Debug, Clone)]
pub struct StaticProvider {
    artifact: ArtifactBlob,
}

impl StaticProvider {
    /// Create provider for fixed bytes
    #[inline]
    #[must_use]
    pub fn new(artifact: impl Into<ArtifactBlob>) -> Self {
        Self {
            artifact: artifact.into(),
        }
    }
}

impl ArtifactProvider for StaticProvider {
    fn produce(&self) -> Result<Option<ArtifactBlob>, ProviderError> {
        Ok(Some(self.artifact.clone()))
    }
}

/// Ordered, non-empty sequence of providers
#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn ArtifactProvider>>,
}

impl ProviderChain {
    /// Create chain from providers
    ///
    /// # Errors
    /// Returns [`ConstructionError::EmptyProviderChain`] for an empty list
    pub fn new(providers: Vec<Arc<dyn ArtifactProvider>>) -> Result<Self, ConstructionError> {
        if providers.is_empty() {
            return Err(ConstructionError::EmptyProviderChain);
        }
        Ok(Self { providers })
    }

    /// Chain of exactly one provider
    #[inline]
    #[must_use]
    pub fn single(provider: Arc<dyn ArtifactProvider>) -> Self {
        Self {
            providers: vec![provider],
        }
    }

    /// Number of providers (never zero)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if chain is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Providers in execution order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ArtifactProvider>> {
        self.providers.iter()
    }
}

impl fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderChain")
            .field("len", &self.providers.len())
            .finish()
    }
}
