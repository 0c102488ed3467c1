//! In-process coordination store
//!
//! A hierarchical node tree implementing [`CoordinationClient`]. Writers and
//! subscribers share one `RwLock`; change events are published while the
//! write lock is held so each subscriber sees changes in commit order.
//!
//! A new subscription first receives `Added` for every existing node in its
//! subtree (parents before children), then one `Other` marker on the watched
//! path once that initial snapshot is complete.

use crate::client::{CoordinationClient, StreamEvent, Subscription, SubscriptionCloser};
use crate::error::{StoreError, TransportError};
use crossbeam::channel::{unbounded, Sender};
use dashmap::DashMap;
use hotswap_artifact::{ArtifactBlob, NodePath};
use hotswap_dispatch::{ChangeKind, ChangeNotification};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

struct Subscriber {
    root: NodePath,
    events: Sender<StreamEvent>,
}

struct StoreInner {
    nodes: RwLock<BTreeMap<NodePath, ArtifactBlob>>,
    subscribers: DashMap<u64, Subscriber>,
    next_subscriber: AtomicU64,
    connected: AtomicBool,
}

impl StoreInner {
    /// Deliver to every subscriber whose subtree contains the node
    fn publish(&self, notification: &ChangeNotification) {
        for entry in &self.subscribers {
            if entry.root.contains(&notification.path) {
                // A dropped receiver is unregistered by its closer
                let _ = entry.events.send(StreamEvent::Change(notification.clone()));
            }
        }
    }

    /// Insert or replace under the caller's write lock, creating missing
    /// parents with empty data
    fn write_node(&self, nodes: &mut BTreeMap<NodePath, ArtifactBlob>, path: &NodePath, data: ArtifactBlob) {
        for ancestor in path.ancestors().into_iter().filter(|a| !a.is_root()) {
            if !nodes.contains_key(&ancestor) {
                nodes.insert(ancestor.clone(), ArtifactBlob::empty());
                self.publish(&ChangeNotification::added(ancestor, ArtifactBlob::empty()));
            }
        }

        let kind = if nodes.insert(path.clone(), data.clone()).is_some() {
            ChangeKind::Updated
        } else {
            ChangeKind::Added
        };
        tracing::debug!("Node {} {:?} ({} bytes)", path, kind, data.len());
        self.publish(&ChangeNotification::new(path.clone(), kind, data));
    }

    fn ensure_connected(&self) -> Result<(), StoreError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Disconnected)
        }
    }
}

/// In-memory coordination tree
///
/// Cloning shares the same tree.
#[derive(Clone)]
pub struct MemoryCoordinationStore {
    inner: Arc<StoreInner>,
}

impl MemoryCoordinationStore {
    /// Create empty, connected store
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                nodes: RwLock::new(BTreeMap::new()),
                subscribers: DashMap::new(),
                next_subscriber: AtomicU64::new(0),
                connected: AtomicBool::new(true),
            }),
        }
    }

    /// Create or replace a node, creating missing parents with empty data
    ///
    /// # Errors
    /// Returns [`StoreError::Disconnected`] after [`disconnect`](Self::disconnect)
    pub fn put(&self, path: &NodePath, data: impl Into<ArtifactBlob>) -> Result<(), StoreError> {
        let mut nodes = self.inner.nodes.write();
        self.inner.ensure_connected()?;
        self.inner.write_node(&mut nodes, path, data.into());
        Ok(())
    }

    /// Create a node that must not exist yet
    ///
    /// # Errors
    /// Returns [`StoreError::NodeExists`] if the node is already present
    pub fn create(&self, path: &NodePath, data: impl Into<ArtifactBlob>) -> Result<(), StoreError> {
        let mut nodes = self.inner.nodes.write();
        self.inner.ensure_connected()?;
        if nodes.contains_key(path) {
            return Err(StoreError::NodeExists(path.clone()));
        }
        self.inner.write_node(&mut nodes, path, data.into());
        Ok(())
    }

    /// Replace data of an existing node
    ///
    /// # Errors
    /// Returns [`StoreError::NoNode`] if the node is missing
    pub fn set_data(&self, path: &NodePath, data: impl Into<ArtifactBlob>) -> Result<(), StoreError> {
        let data = data.into();
        let mut nodes = self.inner.nodes.write();
        self.inner.ensure_connected()?;
        let slot = nodes
            .get_mut(path)
            .ok_or_else(|| StoreError::NoNode(path.clone()))?;
        *slot = data.clone();
        self.inner.publish(&ChangeNotification::updated(path.clone(), data));
        Ok(())
    }

    /// Delete a node and its whole subtree, deepest nodes first
    ///
    /// # Errors
    /// Returns [`StoreError::NoNode`] if the node is missing
    pub fn delete(&self, path: &NodePath) -> Result<(), StoreError> {
        let mut nodes = self.inner.nodes.write();
        self.inner.ensure_connected()?;
        if !nodes.contains_key(path) {
            return Err(StoreError::NoNode(path.clone()));
        }

        let mut doomed: Vec<NodePath> = nodes
            .range(path.clone()..)
            .map(|(p, _)| p)
            .take_while(|p| path.contains(p))
            .cloned()
            .collect();
        doomed.sort_by_key(|p| std::cmp::Reverse(p.depth()));

        for node in doomed {
            nodes.remove(&node);
            self.inner.publish(&ChangeNotification::removed(node));
        }
        Ok(())
    }

    /// Current data of a node
    #[must_use]
    pub fn get(&self, path: &NodePath) -> Option<ArtifactBlob> {
        self.inner.nodes.read().get(path).cloned()
    }

    /// Check if a node exists
    #[must_use]
    pub fn exists(&self, path: &NodePath) -> bool {
        self.inner.nodes.read().contains_key(path)
    }

    /// Direct children of a node
    #[must_use]
    pub fn children(&self, path: &NodePath) -> Vec<NodePath> {
        self.inner
            .nodes
            .read()
            .keys()
            .filter(|p| p.parent().as_ref() == Some(path))
            .cloned()
            .collect()
    }

    /// End the session: every subscription receives a terminal
    /// [`TransportError::ConnectionLost`] and is dropped
    pub fn disconnect(&self) {
        let _nodes = self.inner.nodes.write();
        if !self.inner.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::warn!("Coordination store disconnected");

        let ids: Vec<u64> = self.inner.subscribers.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some((_, subscriber)) = self.inner.subscribers.remove(&id) {
                let _ = subscriber
                    .events
                    .send(StreamEvent::Terminated(TransportError::ConnectionLost(
                        "session closed".into(),
                    )));
            }
        }
    }

    /// Open a new session; existing data is kept
    pub fn reconnect(&self) {
        self.inner.connected.store(true, Ordering::SeqCst);
    }

    /// Check if the session is live
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl Default for MemoryCoordinationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinationClient for MemoryCoordinationStore {
    fn subscribe(&self, path: &NodePath) -> Result<Subscription, TransportError> {
        // Read lock keeps writers out until the snapshot is queued
        let nodes = self.inner.nodes.read();
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let (tx, rx) = unbounded();
        for (node, data) in nodes.iter().filter(|(p, _)| path.contains(p)) {
            let _ = tx.send(StreamEvent::Change(ChangeNotification::added(node.clone(), data.clone())));
        }
        let _ = tx.send(StreamEvent::Change(ChangeNotification::new(
            path.clone(),
            ChangeKind::Other,
            ArtifactBlob::empty(),
        )));

        let id = self.inner.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.inner.subscribers.insert(
            id,
            Subscriber {
                root: path.clone(),
                events: tx,
            },
        );
        drop(nodes);
        tracing::debug!("Subscribed #{} to {}", id, path);

        let inner: Weak<StoreInner> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(
            rx,
            SubscriptionCloser::new(move || {
                if let Some(inner) = inner.upgrade() {
                    inner.subscribers.remove(&id);
                }
            }),
        ))
    }
}

impl std::fmt::Debug for MemoryCoordinationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCoordinationStore")
            .field("nodes", &self.inner.nodes.read().len())
            .field("subscribers", &self.inner.subscribers.len())
            .field("connected", &self.is_connected())
            .finish()
    }
}
