//! Per-artifact dispatch outcomes and the observer contract

use crate::error::DispatchError;
use hotswap_artifact::ArtifactIdentifier;
use std::sync::Arc;

/// Result of one attempted artifact dispatch
///
/// Exactly one outcome exists per artifact actually attempted. Successful
/// outcomes always carry an identifier.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Identifier, when resolution got that far
    pub identifier: Option<ArtifactIdentifier>,
    /// Failure cause (`None` on success)
    pub error: Option<DispatchError>,
}

impl DispatchOutcome {
    /// Successful apply of `identifier`
    #[inline]
    #[must_use]
    pub fn success(identifier: ArtifactIdentifier) -> Self {
        Self {
            identifier: Some(identifier),
            error: None,
        }
    }

    /// Failed dispatch
    #[inline]
    #[must_use]
    pub fn failure(identifier: Option<ArtifactIdentifier>, error: impl Into<DispatchError>) -> Self {
        Self {
            identifier,
            error: Some(error.into()),
        }
    }

    /// Check if the artifact was applied
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Identifier as string slice
    #[inline]
    #[must_use]
    pub fn identifier_str(&self) -> Option<&str> {
        self.identifier.as_ref().map(ArtifactIdentifier::as_str)
    }
}

/// Receives dispatch outcomes
///
/// Invoked synchronously on the dispatching thread, in the order outcomes are
/// produced.
pub trait Observer: Send + Sync {
    /// Artifact applied
    fn on_success(&self, identifier: &ArtifactIdentifier);

    /// Artifact failed; `identifier` is `None` when it was never resolved
    fn on_failure(&self, identifier: Option<&ArtifactIdentifier>, error: &DispatchError);

    /// Route an outcome to `on_success` / `on_failure`
    fn notify(&self, outcome: &DispatchOutcome) {
        match (&outcome.error, &outcome.identifier) {
            (None, Some(identifier)) => self.on_success(identifier),
            (Some(error), identifier) => self.on_failure(identifier.as_ref(), error),
            (None, None) => {
                tracing::error!("Dropping successful outcome without identifier");
            }
        }
    }
}

/// Observer built from two closures
pub struct FnObserver<S, F> {
    on_success: S,
    on_failure: F,
}

impl<S, F> FnObserver<S, F>
where
    S: Fn(&ArtifactIdentifier) + Send + Sync,
    F: Fn(Option<&ArtifactIdentifier>, &DispatchError) + Send + Sync,
{
    /// Create observer from success and failure callbacks
    #[inline]
    #[must_use]
    pub fn new(on_success: S, on_failure: F) -> Self {
        Self {
            on_success,
            on_failure,
        }
    }

    /// Share as observer trait object
    #[inline]
    #[must_use]
    pub fn shared(self) -> Arc<dyn Observer>
    where
        S: 'static,
        F: 'static,
    {
        Arc::new(self)
    }
}

impl<S, F> Observer for FnObserver<S, F>
where
    S: Fn(&ArtifactIdentifier) + Send + Sync,
    F: Fn(Option<&ArtifactIdentifier>, &DispatchError) + Send + Sync,
{
    fn on_success(&self, identifier: &ArtifactIdentifier) {
        (self.on_success)(identifier);
    }

    fn on_failure(&self, identifier: Option<&ArtifactIdentifier>, error: &DispatchError) {
        (self.on_failure)(identifier, error);
    }
}
