//! Change routing
//!
//! [`NodeChangeRouter`] turns one [`ChangeNotification`] into zero or more
//! dispatch outcomes according to its [`WatchBinding`].

use crate::backend::ApplyBackend;
use crate::chain::{ChainSummary, ProviderChainExecutor};
use crate::coordinator::ApplyCoordinator;
use crate::error::{panic_message, ConstructionError};
use crate::notification::ChangeNotification;
use crate::outcome::{DispatchOutcome, Observer};
use crate::provider::{ArtifactProvider, ProviderChain};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Where artifacts come from for a binding
#[derive(Debug, Clone)]
pub enum DispatchMode {
    /// Apply the node's own data
    Payload,
    /// Ignore the node's data and run the provider chain
    Chain(ProviderChain),
}

/// Router configuration attached to one watched path
#[derive(Clone)]
pub struct WatchBinding {
    mode: DispatchMode,
    observer: Option<Arc<dyn Observer>>,
}

impl WatchBinding {
    /// Binding that applies node payloads
    #[inline]
    #[must_use]
    pub fn payload() -> Self {
        Self {
            mode: DispatchMode::Payload,
            observer: None,
        }
    }

    /// Binding that runs `providers` on every change
    ///
    /// # Errors
    /// Returns [`ConstructionError::EmptyProviderChain`] for an empty list
    pub fn chain(providers: Vec<Arc<dyn ArtifactProvider>>) -> Result<Self, ConstructionError> {
        Ok(Self {
            mode: DispatchMode::Chain(ProviderChain::new(providers)?),
            observer: None,
        })
    }

    /// Binding that runs a single provider on every change
    #[inline]
    #[must_use]
    pub fn single(provider: Arc<dyn ArtifactProvider>) -> Self {
        Self {
            mode: DispatchMode::Chain(ProviderChain::single(provider)),
            observer: None,
        }
    }

    /// Attach outcome observer
    #[inline]
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Dispatch mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> &DispatchMode {
        &self.mode
    }

    /// Check if node payloads are applied directly
    #[inline]
    #[must_use]
    pub fn is_payload_mode(&self) -> bool {
        matches!(self.mode, DispatchMode::Payload)
    }

    /// Attached observer, if any
    #[inline]
    #[must_use]
    pub fn observer(&self) -> Option<&Arc<dyn Observer>> {
        self.observer.as_ref()
    }
}

impl fmt::Debug for WatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBinding")
            .field("mode", &self.mode)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Routes change notifications of one binding into the apply coordinator
pub struct NodeChangeRouter {
    binding: WatchBinding,
    backend: Arc<dyn ApplyBackend>,
}

impl NodeChangeRouter {
    /// Create router
    #[inline]
    #[must_use]
    pub fn new(binding: WatchBinding, backend: Arc<dyn ApplyBackend>) -> Self {
        Self { binding, backend }
    }

    /// Router binding
    #[inline]
    #[must_use]
    pub fn binding(&self) -> &WatchBinding {
        &self.binding
    }

    /// Route one notification
    ///
    /// The observer sees every outcome before this returns, in production
    /// order; a panicking observer is logged and does not cut the route
    /// short. Removed and unrecognized notifications produce nothing.
    pub fn route(&self, notification: &ChangeNotification) -> Vec<DispatchOutcome> {
        if !notification.kind.is_actionable() {
            tracing::debug!("Ignoring {:?} on {}", notification.kind, notification.path);
            return Vec::new();
        }

        tracing::info!("Node {} changed ({:?})", notification.path, notification.kind);

        let outcomes = match &self.binding.mode {
            DispatchMode::Payload => self.route_payload(notification),
            DispatchMode::Chain(chain) => ProviderChainExecutor::new(self.backend.as_ref())
                .run_with(chain, |outcome| self.observe(outcome)),
        };

        let summary = ChainSummary::of(&outcomes);
        tracing::info!(
            "Hot update of {}: {} success, {} failure",
            notification.path,
            summary.succeeded,
            summary.failed
        );
        outcomes
    }

    fn route_payload(&self, notification: &ChangeNotification) -> Vec<DispatchOutcome> {
        if notification.payload.is_empty() {
            tracing::warn!("Node data is empty for {}", notification.path);
            return Vec::new();
        }

        ApplyCoordinator::global()
            .apply(self.backend.as_ref(), &notification.payload)
            .map(|outcome| {
                if let Some(error) = &outcome.error {
                    tracing::error!("Hot update from {} failed: {}", notification.path, error);
                }
                self.observe(&outcome);
                vec![outcome]
            })
            .unwrap_or_default()
    }

    fn observe(&self, outcome: &DispatchOutcome) {
        let Some(observer) = &self.binding.observer else {
            return;
        };
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| observer.notify(outcome))) {
            tracing::error!(
                "Observer panicked on outcome for {}: {}",
                outcome.identifier_str().unwrap_or("<unresolved>"),
                panic_message(payload.as_ref())
            );
        }
    }
}

impl fmt::Debug for NodeChangeRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeChangeRouter")
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}
