//! Process-wide apply coordinator
//!
//! Every artifact applied by this crate goes through [`ApplyCoordinator::global`].
//! The coordinator owns a single exclusive section: at most one
//! [`ApplyBackend`] call is in flight at any instant, whichever binding or
//! thread requested it.
//!
//! # Critical Invariant
//!
//! The exclusive section is released on every exit path: success, backend
//! error, identifier-resolution error and backend panic. Failures never
//! propagate out of [`ApplyCoordinator::apply`]; they become failed
//! [`DispatchOutcome`]s.

use crate::backend::ApplyBackend;
use crate::error::{panic_message, DispatchError};
use crate::outcome::DispatchOutcome;
use hotswap_artifact::ArtifactBlob;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::Serialize;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};

static GLOBAL: Lazy<ApplyCoordinator> = Lazy::new(ApplyCoordinator::new);

thread_local! {
    static IN_SECTION: Cell<bool> = const { Cell::new(false) };
}

/// Snapshot of the coordinator's process-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    /// Non-empty artifacts submitted
    pub attempted: u64,
    /// Artifacts applied
    pub succeeded: u64,
    /// Artifacts that failed (including rejected re-entrant calls)
    pub failed: u64,
}

/// Serializes apply operations process-wide
#[derive(Debug)]
pub struct ApplyCoordinator {
    section: Mutex<()>,
    attempted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl ApplyCoordinator {
    fn new() -> Self {
        Self {
            section: Mutex::new(()),
            attempted: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// The process-wide coordinator (initialized on first use)
    #[inline]
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Apply one artifact inside the exclusive section
    ///
    /// Blocks until the section is free. Returns `None` for an empty
    /// artifact (no attempt, no outcome); otherwise exactly one outcome.
    ///
    /// A call made from inside an apply backend on the same thread is
    /// rejected with [`DispatchError::Reentrant`] instead of deadlocking.
    pub fn apply(&self, backend: &dyn ApplyBackend, artifact: &ArtifactBlob) -> Option<DispatchOutcome> {
        if artifact.is_empty() {
            tracing::debug!("Skipping empty artifact");
            return None;
        }
        self.attempted.fetch_add(1, Ordering::Relaxed);

        if Self::is_held_by_current_thread() {
            tracing::error!("Apply requested from inside an apply backend; rejecting");
            self.failed.fetch_add(1, Ordering::Relaxed);
            return Some(DispatchOutcome::failure(None, DispatchError::Reentrant));
        }

        let outcome = {
            let _section = self.section.lock();
            let _marker = SectionMarker::enter();
            Self::apply_exclusive(backend, artifact)
        };

        if outcome.is_success() {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        Some(outcome)
    }

    fn apply_exclusive(backend: &dyn ApplyBackend, artifact: &ArtifactBlob) -> DispatchOutcome {
        let digest = artifact.digest().short();

        let identifier = match catch_unwind(AssertUnwindSafe(|| backend.identify(artifact))) {
            Ok(Ok(identifier)) => identifier,
            Ok(Err(e)) => {
                tracing::error!("Failed to resolve identifier of artifact {}: {}", digest, e);
                return DispatchOutcome::failure(None, e);
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("Identifier resolution panicked for artifact {}: {}", digest, message);
                return DispatchOutcome::failure(None, DispatchError::BackendPanicked(message));
            }
        };

        tracing::debug!("Applying [{}] ({} bytes, {})", identifier, artifact.len(), digest);
        match catch_unwind(AssertUnwindSafe(|| backend.apply(&identifier, artifact))) {
            Ok(Ok(())) => DispatchOutcome::success(identifier),
            Ok(Err(e)) => {
                tracing::error!("Apply of [{}] failed: {}", identifier, e);
                DispatchOutcome::failure(Some(identifier), e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("Apply of [{}] panicked: {}", identifier, message);
                DispatchOutcome::failure(Some(identifier), DispatchError::BackendPanicked(message))
            }
        }
    }

    /// Check if the calling thread is currently inside the exclusive section
    #[inline]
    #[must_use]
    pub fn is_held_by_current_thread() -> bool {
        IN_SECTION.with(Cell::get)
    }

    /// Counter snapshot
    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            attempted: self.attempted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Marks the current thread as inside the section until dropped
struct SectionMarker;

impl SectionMarker {
    fn enter() -> Self {
        IN_SECTION.with(|flag| flag.set(true));
        Self
    }
}

impl Drop for SectionMarker {
    fn drop(&mut self) {
        IN_SECTION.with(|flag| flag.set(false));
    }
}
