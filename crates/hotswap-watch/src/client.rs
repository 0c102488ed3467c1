//! Coordination client boundary
//!
//! A [`CoordinationClient`] is an already-connected session to a hierarchical
//! coordination service. Subscribing to a path yields a [`Subscription`]: a
//! channel of [`StreamEvent`]s covering the whole subtree, plus a closer that
//! unregisters it.

use crate::error::TransportError;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use hotswap_artifact::NodePath;
use hotswap_dispatch::ChangeNotification;
use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;

/// One item of a subscription stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A node in the subtree changed
    Change(ChangeNotification),
    /// The stream ended because of a transport problem; nothing follows
    Terminated(TransportError),
}

/// Connected coordination-service session
pub trait CoordinationClient: Send + Sync {
    /// Subscribe to every change under `path` (inclusive)
    ///
    /// # Errors
    /// Returns [`TransportError`] if the session is gone or the service
    /// refuses the subscription
    fn subscribe(&self, path: &NodePath) -> Result<Subscription, TransportError>;
}

type CloseFn = Box<dyn FnOnce() + Send>;

/// Unregisters a subscription exactly once
///
/// Closing also happens on drop.
pub struct SubscriptionCloser {
    close: Mutex<Option<CloseFn>>,
}

impl SubscriptionCloser {
    /// Wrap the client's unregister action
    #[must_use]
    pub fn new(close: impl FnOnce() + Send + 'static) -> Self {
        Self {
            close: Mutex::new(Some(Box::new(close))),
        }
    }

    /// Closer with nothing to release
    #[must_use]
    pub fn noop() -> Self {
        Self {
            close: Mutex::new(None),
        }
    }

    /// Unregister; later calls do nothing
    pub fn close(&self) {
        let close = self.close.lock().take();
        if let Some(close) = close {
            close();
        }
    }

    /// Check if close already ran
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.close.lock().is_none()
    }
}

impl Drop for SubscriptionCloser {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SubscriptionCloser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionCloser")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Live subscription to a subtree
#[derive(Debug)]
pub struct Subscription {
    events: Receiver<StreamEvent>,
    closer: SubscriptionCloser,
}

impl Subscription {
    /// Assemble subscription from its event channel and closer
    #[inline]
    #[must_use]
    pub fn new(events: Receiver<StreamEvent>, closer: SubscriptionCloser) -> Self {
        Self { events, closer }
    }

    /// Block for the next event; `None` once the client dropped the stream
    #[must_use]
    pub fn recv(&self) -> Option<StreamEvent> {
        self.events.recv().ok()
    }

    /// Wait at most `timeout` for the next event
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<StreamEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Unregister the subscription (idempotent)
    pub fn close(&self) {
        self.closer.close();
    }

    /// Split into event channel and closer
    #[must_use]
    pub fn into_parts(self) -> (Receiver<StreamEvent>, SubscriptionCloser) {
        (self.events, self.closer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn closer_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let closer = SubscriptionCloser::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        closer.close();
        closer.close();
        assert!(closer.is_closed());
        drop(closer);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_subscription_closes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let (_tx, rx) = unbounded();
        let subscription = Subscription::new(
            rx,
            SubscriptionCloser::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        drop(subscription);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn recv_ends_when_sender_dropped() {
        let (tx, rx) = unbounded();
        let subscription = Subscription::new(rx, SubscriptionCloser::noop());
        tx.send(StreamEvent::Terminated(TransportError::NotConnected)).unwrap();
        drop(tx);

        assert_eq!(
            subscription.recv(),
            Some(StreamEvent::Terminated(TransportError::NotConnected))
        );
        assert_eq!(subscription.recv(), None);
    }
}
