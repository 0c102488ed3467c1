//! Provider chain execution
//!
//! Runs every provider of a [`ProviderChain`] in order through the apply
//! coordinator. One provider's failure never skips later providers: a chain
//! of N providers always yields N outcomes.

use crate::backend::ApplyBackend;
use crate::coordinator::ApplyCoordinator;
use crate::error::{panic_message, DispatchError, ProviderError};
use crate::outcome::DispatchOutcome;
use crate::provider::{ArtifactProvider, ProviderChain};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Counts of one chain run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainSummary {
    /// Outcomes that applied
    pub succeeded: usize,
    /// Outcomes that failed
    pub failed: usize,
}

impl ChainSummary {
    /// Summarize a sequence of outcomes
    #[must_use]
    pub fn of(outcomes: &[DispatchOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        Self {
            succeeded,
            failed: outcomes.len() - succeeded,
        }
    }
}

/// Executes provider chains against one backend
#[derive(Clone, Copy)]
pub struct ProviderChainExecutor<'a> {
    coordinator: &'a ApplyCoordinator,
    backend: &'a dyn ApplyBackend,
}

impl<'a> ProviderChainExecutor<'a> {
    /// Create executor applying through the global coordinator
    #[inline]
    #[must_use]
    pub fn new(backend: &'a dyn ApplyBackend) -> Self {
        Self {
            coordinator: ApplyCoordinator::global(),
            backend,
        }
    }

    /// Run the chain, collecting one outcome per provider
    #[must_use]
    pub fn run(&self, chain: &ProviderChain) -> Vec<DispatchOutcome> {
        self.run_with(chain, |_| {})
    }

    /// Run the chain, handing each outcome to `sink` as soon as it exists
    ///
    /// Providers run strictly in chain order on the calling thread.
    pub fn run_with<F>(&self, chain: &ProviderChain, mut sink: F) -> Vec<DispatchOutcome>
    where
        F: FnMut(&DispatchOutcome),
    {
        let total = chain.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, provider) in chain.iter().enumerate() {
            tracing::debug!("Executing provider [{}/{}]", i + 1, total);
            let outcome = self.run_provider(provider.as_ref());
            if let Some(error) = &outcome.error {
                tracing::error!("Provider [{}/{}] failed: {}", i + 1, total, error);
            }
            sink(&outcome);
            outcomes.push(outcome);
        }

        outcomes
    }

    fn run_provider(&self, provider: &dyn ArtifactProvider) -> DispatchOutcome {
        let produced = catch_unwind(AssertUnwindSafe(|| provider.produce())).unwrap_or_else(|payload| {
            Err(ProviderError::Panicked(panic_message(payload.as_ref())))
        });

        match produced {
            Ok(Some(artifact)) => self
                .coordinator
                .apply(self.backend, &artifact)
                .unwrap_or_else(|| DispatchOutcome::failure(None, DispatchError::NoArtifact)),
            Ok(None) => DispatchOutcome::failure(None, DispatchError::NoArtifact),
            Err(e) => DispatchOutcome::failure(None, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApplyError;
    use hotswap_artifact::{ArtifactBlob, ArtifactIdentifier, IdentifierResolutionError};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::sync::Arc;

    /// Backend treating the blob as a UTF-8 identifier
    #[derive(Default)]
    struct NameBackend {
        applied: Mutex<Vec<String>>,
    }

    impl ApplyBackend for NameBackend {
        fn identify(&self, artifact: &ArtifactBlob) -> Result<ArtifactIdentifier, IdentifierResolutionError> {
            std::str::from_utf8(artifact.as_bytes())
                .map(ArtifactIdentifier::from)
                .map_err(|e| IdentifierResolutionError::Malformed(e.to_string()))
        }

        fn apply(&self, identifier: &ArtifactIdentifier, _: &ArtifactBlob) -> Result<(), ApplyError> {
            if identifier.as_str().starts_with("reject") {
                return Err(ApplyError::Backend("rejected".into()));
            }
            self.applied.lock().push(identifier.to_string());
            Ok(())
        }
    }

    fn yields(name: &'static str) -> Arc<dyn ArtifactProvider> {
        Arc::new(move || -> Result<Option<ArtifactBlob>, ProviderError> {
            Ok(Some(ArtifactBlob::new(name.as_bytes().to_vec())))
        })
    }

    fn fails() -> Arc<dyn ArtifactProvider> {
        Arc::new(|| -> Result<Option<ArtifactBlob>, ProviderError> {
            Err(ProviderError::Unavailable("down".into()))
        })
    }

    fn nothing() -> Arc<dyn ArtifactProvider> {
        Arc::new(|| -> Result<Option<ArtifactBlob>, ProviderError> { Ok(None) })
    }

    fn panics() -> Arc<dyn ArtifactProvider> {
        Arc::new(|| -> Result<Option<ArtifactBlob>, ProviderError> { panic!("provider bug") })
    }

    fn empty_bytes() -> Arc<dyn ArtifactProvider> {
        Arc::new(|| -> Result<Option<ArtifactBlob>, ProviderError> { Ok(Some(ArtifactBlob::empty())) })
    }

    #[test]
    fn middle_failure_does_not_stop_chain() {
        let backend = NameBackend::default();
        let chain = ProviderChain::new(vec![yields("a.First"), fails(), yields("a.Third")]).unwrap();

        let outcomes = ProviderChainExecutor::new(&backend).run(&chain);

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].identifier_str(), Some("a.First"));
        assert!(outcomes[0].is_success());
        assert!(outcomes[1].identifier.is_none());
        assert!(matches!(outcomes[1].error, Some(DispatchError::Provider(_))));
        assert_eq!(outcomes[2].identifier_str(), Some("a.Third"));
        assert_eq!(*backend.applied.lock(), vec!["a.First", "a.Third"]);
    }

    #[test]
    fn none_empty_and_panicking_providers_are_failures() {
        let backend = NameBackend::default();
        let chain = ProviderChain::new(vec![nothing(), empty_bytes(), panics(), yields("a.Last")]).unwrap();

        let outcomes = ProviderChainExecutor::new(&backend).run(&chain);

        assert_eq!(outcomes.len(), 4);
        assert!(matches!(outcomes[0].error, Some(DispatchError::NoArtifact)));
        assert!(matches!(outcomes[1].error, Some(DispatchError::NoArtifact)));
        assert!(matches!(
            outcomes[2].error,
            Some(DispatchError::Provider(ProviderError::Panicked(_)))
        ));
        assert!(outcomes[3].is_success());
    }

    #[test]
    fn backend_rejection_keeps_identifier() {
        let backend = NameBackend::default();
        let chain = ProviderChain::single(yields("reject.Me"));
        let outcomes = ProviderChainExecutor::new(&backend).run(&chain);
        assert_eq!(outcomes[0].identifier_str(), Some("reject.Me"));
        assert!(matches!(outcomes[0].error, Some(DispatchError::Apply(_))));
    }

    #[test]
    fn sink_sees_outcomes_in_order() {
        let backend = NameBackend::default();
        let chain = ProviderChain::new(vec![yields("a.One"), nothing(), yields("a.Two")]).unwrap();
        let mut seen = Vec::new();

        let outcomes = ProviderChainExecutor::new(&backend)
            .run_with(&chain, |o| seen.push(o.identifier_str().unwrap_or("-").to_string()));

        assert_eq!(seen, vec!["a.One", "-", "a.Two"]);
        assert_eq!(ChainSummary::of(&outcomes), ChainSummary { succeeded: 2, failed: 1 });
    }

    proptest! {
        #[test]
        fn chain_always_runs_to_completion(mask in proptest::collection::vec(any::<bool>(), 1..12)) {
            let backend = NameBackend::default();
            let providers: Vec<_> = mask
                .iter()
                .map(|ok| if *ok { yields("p.Ok") } else { fails() })
                .collect();
            let chain = ProviderChain::new(providers).unwrap();

            let outcomes = ProviderChainExecutor::new(&backend).run(&chain);

            prop_assert_eq!(outcomes.len(), mask.len());
            for (outcome, ok) in outcomes.iter().zip(&mask) {
                prop_assert_eq!(outcome.is_success(), *ok);
            }
            prop_assert_eq!(backend.applied.lock().len(), mask.iter().filter(|ok| **ok).count());
        }
    }
}
