//! Hotswap Dispatch
//!
//! Serialized, failure-isolated delivery of update artifacts to an apply
//! backend.
//!
//! # Core Concepts
//!
//! - [`ApplyBackend`]: Opaque apply capability ([`TargetRegistry`] is an in-process one)
//! - [`ArtifactProvider`]: Produces zero-or-one artifact on demand
//! - [`ApplyCoordinator`]: Process-wide exclusive section around every apply
//! - [`ProviderChainExecutor`]: Runs a chain of providers, isolating failures
//! - [`NodeChangeRouter`]: Turns a [`ChangeNotification`] into outcomes per [`WatchBinding`]
//! - [`Observer`]: Receives each [`DispatchOutcome`] synchronously
//!
//! # Example
//!
//! ```rust,ignore
//! use hotswap_dispatch::{ChangeNotification, NodeChangeRouter, TargetRegistry, WatchBinding};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(TargetRegistry::new());
//! registry.register("com.acme.Greeter", Arc::new(|blob: &_| reload_greeter(blob)));
//!
//! let router = NodeChangeRouter::new(WatchBinding::payload(), registry);
//! let outcomes = router.route(&ChangeNotification::updated(path, class_bytes));
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod backend;
mod chain;
mod coordinator;
mod direct;
mod error;
mod notification;
mod outcome;
mod provider;
mod router;

// Re-exports
pub use backend::{ApplyBackend, ReloadTarget, TargetRegistry};
pub use chain::{ChainSummary, ProviderChainExecutor};
pub use coordinator::{ApplyCoordinator, CoordinatorStats};
pub use direct::{dispatch_artifact, dispatch_providers};
pub use error::{ApplyError, ConstructionError, DispatchError, ProviderError};
pub use notification::{ChangeKind, ChangeNotification};
pub use outcome::{DispatchOutcome, FnObserver, Observer};
pub use provider::{ArtifactProvider, ProviderChain, StaticProvider};
pub use router::{DispatchMode, NodeChangeRouter, WatchBinding};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
