//! Hotswap Watch
//!
//! Watches a coordination-tree subtree and feeds every added or updated node
//! into the hotswap dispatcher.
//!
//! # Core Concepts
//!
//! - [`CoordinationClient`]: Connected session yielding [`Subscription`]s
//! - [`MemoryCoordinationStore`]: In-process node tree implementing the client
//! - [`CoordinationWatch`]: Starts watches bound to one apply backend
//! - [`WatchHandle`]: Running watch; stop it (or drop it) to release the subscription
//! - [`WatchConfig`]: TOML-loadable watch description
//!
//! # Example
//!
//! ```rust,ignore
//! use hotswap_dispatch::{TargetRegistry, WatchBinding};
//! use hotswap_watch::{CoordinationWatch, MemoryCoordinationStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryCoordinationStore::new());
//! let watch = CoordinationWatch::new(store.clone(), Arc::new(TargetRegistry::new()));
//! let handle = watch.start("/hotswap/classes".parse()?, WatchBinding::payload())?;
//!
//! store.put(&"/hotswap/classes/Greeter".parse()?, class_bytes)?;
//! handle.stop();
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod memory;
mod watch;

// Re-exports
pub use client::{CoordinationClient, StreamEvent, Subscription, SubscriptionCloser};
pub use config::{ModeKind, WatchConfig};
pub use error::{ConfigError, StoreError, TransportError, WatchError};
pub use memory::MemoryCoordinationStore;
pub use watch::{CoordinationWatch, WatchHandle, WatchId};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
