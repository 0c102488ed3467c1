//! Dispatch through the global coordinator with real class-file artifacts

use hotswap_artifact::{ArtifactBlob, ArtifactIdentifier};
use hotswap_dispatch::{
    dispatch_artifact, dispatch_providers, ApplyCoordinator, ArtifactProvider, ChangeNotification,
    DispatchError, NodeChangeRouter, ProviderChain, StaticProvider, TargetRegistry, WatchBinding,
};
use hotswap_test_utils::{
    class_file_blob, class_file_bytes, init_tracing, EmptyProvider, FailingProvider, Observed,
    RecordingBackend, RecordingObserver,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn registry_reloads_target_named_by_class_file() {
    init_tracing();
    let registry = TargetRegistry::new();
    let reloads = Arc::new(AtomicUsize::new(0));
    let counter = reloads.clone();
    registry.register(
        "com.acme.Greeter",
        Arc::new(move |_: &ArtifactBlob| -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );
    let observer = RecordingObserver::new();

    let ok = dispatch_artifact(&registry, &class_file_blob("com.acme.Greeter"), Some(observer.as_ref()));
    let missing = dispatch_artifact(&registry, &class_file_blob("com.acme.Other"), Some(observer.as_ref()));

    assert!(ok.unwrap().is_success());
    let missing = missing.unwrap();
    assert_eq!(missing.identifier_str(), Some("com.acme.Other"));
    assert!(matches!(missing.error, Some(DispatchError::Apply(_))));
    assert_eq!(reloads.load(Ordering::SeqCst), 1);
    assert_eq!(observer.successes(), vec!["com.acme.Greeter".to_string()]);
    assert_eq!(observer.failure_count(), 1);
}

#[test]
fn same_artifact_twice_gives_two_outcomes() {
    let backend = RecordingBackend::new();
    let blob = class_file_blob("pkg.Twice");

    let first = dispatch_artifact(&backend, &blob, None).unwrap();
    let second = dispatch_artifact(&backend, &blob, None).unwrap();

    assert_eq!(first.identifier_str(), Some("pkg.Twice"));
    assert_eq!(second.identifier_str(), Some("pkg.Twice"));
    assert_eq!(backend.applied(), vec!["pkg.Twice".to_string(), "pkg.Twice".to_string()]);
}

#[test]
fn three_providers_second_fails() {
    let backend = RecordingBackend::new();
    let observer = RecordingObserver::new();
    let chain = ProviderChain::new(vec![
        Arc::new(StaticProvider::new(class_file_bytes("p.One"))),
        Arc::new(FailingProvider),
        Arc::new(StaticProvider::new(class_file_bytes("p.Three"))),
    ])
    .unwrap();

    let outcomes = dispatch_providers(&backend, &chain, Some(observer.as_ref()));

    assert_eq!(outcomes.len(), 3);
    let events = observer.events();
    assert_eq!(events[0], Observed::Success("p.One".into()));
    assert!(matches!(&events[1], Observed::Failure(None, _)));
    assert_eq!(events[2], Observed::Success("p.Three".into()));
}

#[test]
fn concurrent_triggers_never_overlap() {
    let backend = Arc::new(RecordingBackend::utf8().with_delay(Duration::from_millis(1)));
    let router = Arc::new(NodeChangeRouter::new(WatchBinding::payload(), backend.clone()));

    let workers: Vec<_> = (0..6)
        .map(|t| {
            let router = router.clone();
            thread::spawn(move || {
                for n in 0..8 {
                    let path = format!("/t{t}").parse().unwrap();
                    let outcomes = router.route(&ChangeNotification::updated(path, format!("t{t}.n{n}").into_bytes()));
                    assert_eq!(outcomes.len(), 1);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(backend.applied().len(), 48);
    assert_eq!(backend.max_in_flight(), 1);
    assert!(!ApplyCoordinator::is_held_by_current_thread());
}

#[test]
fn empty_provider_counts_as_failure() {
    let backend = RecordingBackend::new();
    let chain = ProviderChain::single(Arc::new(EmptyProvider));
    let outcomes = dispatch_providers(&backend, &chain, None);
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0].error, Some(DispatchError::NoArtifact)));
    assert!(outcomes[0].identifier.is_none());
}

fn provider_for(slot: u8) -> Arc<dyn ArtifactProvider> {
    match slot % 3 {
        0 => Arc::new(StaticProvider::new(class_file_bytes(&format!("gen.C{slot}")))),
        1 => Arc::new(FailingProvider),
        _ => Arc::new(EmptyProvider),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn outcomes_match_chain_length_and_order(slots in proptest::collection::vec(any::<u8>(), 1..10)) {
        let backend = RecordingBackend::new();
        let chain = ProviderChain::new(slots.iter().map(|s| provider_for(*s)).collect()).unwrap();

        let outcomes = dispatch_providers(&backend, &chain, None);

        prop_assert_eq!(outcomes.len(), slots.len());
        for (outcome, slot) in outcomes.iter().zip(&slots) {
            let expected = (slot % 3 == 0).then(|| ArtifactIdentifier::new(format!("gen.C{slot}")));
            prop_assert_eq!(outcome.identifier.clone(), expected);
        }
    }
}
