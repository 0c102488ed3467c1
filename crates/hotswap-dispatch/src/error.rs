//! Error types for artifact dispatch
//!
//! Provides error handling for:
//! - Binding construction (the only error that escapes dispatch)
//! - Apply backend failures
//! - Provider failures
//! - Per-artifact dispatch failures reported through observers

use hotswap_artifact::{ArtifactIdentifier, IdentifierResolutionError, PathError};

/// Invalid dispatch configuration, raised at construction time
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructionError {
    /// Chain mode was selected without any provider
    #[error("provider chain cannot be empty in chain mode")]
    EmptyProviderChain,

    /// Watched path is not a valid node path
    #[error("invalid watch path: {0}")]
    InvalidPath(#[from] PathError),
}

/// Failures raised by an apply backend for a well-formed artifact
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// Artifact content was rejected by the backend
    #[error("malformed artifact {identifier}: {reason}")]
    Malformed {
        /// Identifier resolved before the failure
        identifier: ArtifactIdentifier,
        /// Backend explanation
        reason: String,
    },

    /// Nothing in the running process answers to this identifier
    #[error("no apply target registered for {0}")]
    TargetNotFound(ArtifactIdentifier),

    /// The target refused or failed the update
    #[error("target {identifier} rejected update: {source}")]
    Rejected {
        /// Target identifier
        identifier: ArtifactIdentifier,
        /// Underlying failure
        #[source]
        source: anyhow::Error,
    },

    /// Backend-internal failure
    #[error("apply backend error: {0}")]
    Backend(String),
}

/// Failures raised by an artifact provider
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Source currently unavailable
    #[error("artifact source unavailable: {0}")]
    Unavailable(String),

    /// IO error while reading the artifact
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Provider panicked while producing
    #[error("provider panicked: {0}")]
    Panicked(String),

    /// Any other provider-specific failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why a single artifact dispatch failed
///
/// Handed to [`Observer::on_failure`](crate::Observer::on_failure) and stored
/// in failed [`DispatchOutcome`](crate::DispatchOutcome)s.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Identifier could not be resolved from the artifact
    #[error("identifier resolution failed: {0}")]
    Identifier(#[from] IdentifierResolutionError),

    /// Backend failed to apply the artifact
    #[error("apply failed: {0}")]
    Apply(#[from] ApplyError),

    /// Provider failed to produce an artifact
    #[error("provider failed: {0}")]
    Provider(#[from] ProviderError),

    /// Provider completed but produced nothing
    #[error("provider produced no artifact")]
    NoArtifact,

    /// Backend panicked inside the exclusive section
    #[error("apply backend panicked: {0}")]
    BackendPanicked(String),

    /// Apply was requested from inside an apply backend on the same thread
    #[error("re-entrant apply rejected")]
    Reentrant,
}

impl DispatchError {
    /// Check if failure happened before any artifact reached the backend
    #[inline]
    #[must_use]
    pub fn is_provider_side(&self) -> bool {
        matches!(self, Self::Provider(_) | Self::NoArtifact)
    }
}

/// Render a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_error_display() {
        let err = ConstructionError::EmptyProviderChain;
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn dispatch_error_wraps_apply_error() {
        let err: DispatchError = ApplyError::TargetNotFound("com.example.Missing".into()).into();
        assert!(err.to_string().contains("com.example.Missing"));
        assert!(!err.is_provider_side());
    }

    #[test]
    fn dispatch_error_provider_side() {
        assert!(DispatchError::NoArtifact.is_provider_side());
        let err: DispatchError = ProviderError::Unavailable("offline".into()).into();
        assert!(err.is_provider_side());
    }

    #[test]
    fn panic_message_variants() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
