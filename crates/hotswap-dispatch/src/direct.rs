//! One-shot dispatch without a watch
//!
//! Apply a blob or a provider chain once, through the global coordinator,
//! reporting to an optional observer.

use crate::backend::ApplyBackend;
use crate::chain::ProviderChainExecutor;
use crate::coordinator::ApplyCoordinator;
use crate::outcome::{DispatchOutcome, Observer};
use crate::provider::ProviderChain;
use hotswap_artifact::ArtifactBlob;

/// Apply one artifact
///
/// Returns `None` (and notifies nobody) when `artifact` is empty.
pub fn dispatch_artifact(
    backend: &dyn ApplyBackend,
    artifact: &ArtifactBlob,
    observer: Option<&dyn Observer>,
) -> Option<DispatchOutcome> {
    let outcome = ApplyCoordinator::global().apply(backend, artifact)?;
    if let Some(observer) = observer {
        observer.notify(&outcome);
    }
    Some(outcome)
}

/// Run every provider of `chain` once
pub fn dispatch_providers(
    backend: &dyn ApplyBackend,
    chain: &ProviderChain,
    observer: Option<&dyn Observer>,
) -> Vec<DispatchOutcome> {
    ProviderChainExecutor::new(backend).run_with(chain, |outcome| {
        if let Some(observer) = observer {
            observer.notify(outcome);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockApplyBackend;
    use crate::error::{ApplyError, DispatchError};
    use crate::outcome::FnObserver;
    use crate::provider::StaticProvider;
    use hotswap_artifact::ArtifactIdentifier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn empty_artifact_notifies_nobody() {
        let backend = MockApplyBackend::new();
        let calls = AtomicUsize::new(0);
        let observer = FnObserver::new(
            |_: &ArtifactIdentifier| {
                calls.fetch_add(1, Ordering::SeqCst);
            },
            |_: Option<&ArtifactIdentifier>, _: &DispatchError| {
                calls.fetch_add(1, Ordering::SeqCst);
            },
        );

        assert!(dispatch_artifact(&backend, &ArtifactBlob::empty(), Some(&observer)).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn providers_are_reported_in_order() {
        let mut backend = MockApplyBackend::new();
        backend
            .expect_identify()
            .returning(|blob| Ok(ArtifactIdentifier::new(String::from_utf8_lossy(blob.as_bytes()))));
        backend.expect_apply().returning(|id, _| {
            if id.as_str() == "b.Bad" {
                Err(ApplyError::TargetNotFound(id.clone()))
            } else {
                Ok(())
            }
        });

        let chain = ProviderChain::new(vec![
            Arc::new(StaticProvider::new(b"b.Bad".to_vec())),
            Arc::new(StaticProvider::new(b"b.Good".to_vec())),
        ])
        .unwrap();
        let failures = AtomicUsize::new(0);
        let successes = AtomicUsize::new(0);
        let observer = FnObserver::new(
            |_: &ArtifactIdentifier| {
                successes.fetch_add(1, Ordering::SeqCst);
            },
            |id: Option<&ArtifactIdentifier>, _: &DispatchError| {
                assert_eq!(id.map(ArtifactIdentifier::as_str), Some("b.Bad"));
                failures.fetch_add(1, Ordering::SeqCst);
            },
        );

        let outcomes = dispatch_providers(&backend, &chain, Some(&observer));

        assert_eq!(outcomes.len(), 2);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert_eq!(successes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn single_artifact_without_observer() {
        let mut backend = MockApplyBackend::new();
        backend.expect_identify().returning(|_| Ok("c.D".into()));
        backend.expect_apply().times(1).returning(|_, _| Ok(()));

        let outcome = dispatch_artifact(&backend, &ArtifactBlob::new(vec![1, 2, 3]), None).unwrap();
        assert_eq!(outcome.identifier_str(), Some("c.D"));
    }
}
