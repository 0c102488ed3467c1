//! Testing utilities for the hotswap workspace
//!
//! Shared fakes, fixtures and tracing setup.

#![allow(missing_docs)]

use hotswap_artifact::{
    ArtifactBlob, ArtifactIdentifier, ClassFileResolver, IdentifierResolutionError, IdentifierResolver,
    CLASS_MAGIC,
};
use hotswap_dispatch::{
    ApplyBackend, ApplyError, ArtifactProvider, DispatchError, Observer, ProviderError,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG` (once per process)
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Minimal class file declaring `dotted_name` as `this_class`
pub fn class_file_bytes(dotted_name: &str) -> Vec<u8> {
    let internal = dotted_name.replace('.', "/");
    let name_len = u16::try_from(internal.len()).unwrap();

    let mut out = Vec::new();
    out.extend_from_slice(&CLASS_MAGIC.to_be_bytes());
    out.extend_from_slice(&[0, 0, 0, 52]);
    out.extend_from_slice(&3u16.to_be_bytes());
    out.push(1);
    out.extend_from_slice(&name_len.to_be_bytes());
    out.extend_from_slice(internal.as_bytes());
    out.push(7);
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&0x0021u16.to_be_bytes());
    out.extend_from_slice(&2u16.to_be_bytes());
    out.extend_from_slice(&[0; 10]);
    out
}

/// Class file blob for `dotted_name`
pub fn class_file_blob(dotted_name: &str) -> ArtifactBlob {
    ArtifactBlob::new(class_file_bytes(dotted_name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Success(String),
    Failure(Option<String>, String),
}

/// Observer keeping every callback in order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Observed>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Observed> {
        self.events.lock().clone()
    }

    pub fn successes(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                Observed::Success(id) => Some(id.clone()),
                Observed::Failure(..) => None,
            })
            .collect()
    }

    pub fn failure_count(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, Observed::Failure(..)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Observer for RecordingObserver {
    fn on_success(&self, identifier: &ArtifactIdentifier) {
        self.events.lock().push(Observed::Success(identifier.to_string()));
    }

    fn on_failure(&self, identifier: Option<&ArtifactIdentifier>, error: &DispatchError) {
        self.events
            .lock()
            .push(Observed::Failure(identifier.map(ToString::to_string), error.to_string()));
    }
}

#[derive(Debug, Clone, Copy)]
enum IdentifyMode {
    ClassFile,
    Utf8,
}

/// Backend recording applied identifiers and peak concurrency
#[derive(Debug)]
pub struct RecordingBackend {
    mode: IdentifyMode,
    applied: Mutex<Vec<String>>,
    reject: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingBackend {
    /// Backend resolving identifiers from class files
    pub fn new() -> Self {
        Self::with_mode(IdentifyMode::ClassFile)
    }

    /// Backend treating the whole blob as a UTF-8 identifier
    pub fn utf8() -> Self {
        Self::with_mode(IdentifyMode::Utf8)
    }

    fn with_mode(mode: IdentifyMode) -> Self {
        Self {
            mode,
            applied: Mutex::new(Vec::new()),
            reject: Mutex::new(HashSet::new()),
            delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep inside every apply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail applies of `identifier` with a backend error
    pub fn reject(&self, identifier: &str) {
        self.reject.lock().insert(identifier.to_string());
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplyBackend for RecordingBackend {
    fn identify(&self, artifact: &ArtifactBlob) -> Result<ArtifactIdentifier, IdentifierResolutionError> {
        match self.mode {
            IdentifyMode::ClassFile => ClassFileResolver::new().resolve(artifact),
            IdentifyMode::Utf8 => std::str::from_utf8(artifact.as_bytes())
                .map(ArtifactIdentifier::from)
                .map_err(|e| IdentifierResolutionError::Malformed(e.to_string())),
        }
    }

    fn apply(&self, identifier: &ArtifactIdentifier, _artifact: &ArtifactBlob) -> Result<(), ApplyError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        let rejected = self.reject.lock().contains(identifier.as_str());
        if !rejected {
            self.applied.lock().push(identifier.to_string());
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if rejected {
            Err(ApplyError::Backend(format!("{identifier} rejected")))
        } else {
            Ok(())
        }
    }
}

/// Provider that always fails
#[derive(Debug, Clone, Default)]
pub struct FailingProvider;

impl ArtifactProvider for FailingProvider {
    fn produce(&self) -> Result<Option<ArtifactBlob>, ProviderError> {
        Err(ProviderError::Unavailable("failing provider".into()))
    }
}

/// Provider that never has anything
#[derive(Debug, Clone, Default)]
pub struct EmptyProvider;

impl ArtifactProvider for EmptyProvider {
    fn produce(&self) -> Result<Option<ArtifactBlob>, ProviderError> {
        Ok(None)
    }
}

/// Provider counting how often it ran
#[derive(Debug)]
pub struct CountingProvider {
    artifact: ArtifactBlob,
    calls: AtomicUsize,
}

impl CountingProvider {
    pub fn new(artifact: impl Into<ArtifactBlob>) -> Arc<Self> {
        Arc::new(Self {
            artifact: artifact.into(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArtifactProvider for CountingProvider {
    fn produce(&self) -> Result<Option<ArtifactBlob>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(self.artifact.clone()))
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}
