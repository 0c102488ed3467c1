//! Coordination watches
//!
//! [`CoordinationWatch::start`] subscribes to a subtree and spawns one named
//! dispatch thread that pumps the subscription into a [`NodeChangeRouter`].
//! Notifications of one watch are routed strictly in delivery order; across
//! watches the apply coordinator serializes the backend calls.
//!
//! The returned [`WatchHandle`] owns the binding. Stopping it (explicitly or
//! by drop) closes the subscription and, unless configured otherwise, joins
//! the dispatch thread so nothing is routed once `stop()` returns. An apply
//! already in flight is never interrupted.

use crate::client::{CoordinationClient, StreamEvent, SubscriptionCloser};
use crate::config::{ModeKind, WatchConfig};
use crate::error::{TransportError, WatchError};
use crossbeam::channel::{self, Receiver, Select, Sender};
use hotswap_artifact::NodePath;
use hotswap_dispatch::{
    ApplyBackend, ArtifactProvider, ConstructionError, NodeChangeRouter, Observer, WatchBinding,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use uuid::Uuid;

/// Unique watch identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchId(pub Uuid);

impl WatchId {
    /// Generate new random ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 hex chars, for thread names and logs
    #[must_use]
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for WatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Starts watches against one client and one apply backend
#[derive(Clone)]
pub struct CoordinationWatch {
    client: Arc<dyn CoordinationClient>,
    backend: Arc<dyn ApplyBackend>,
}

impl CoordinationWatch {
    /// Create watch factory
    #[inline]
    #[must_use]
    pub fn new(client: Arc<dyn CoordinationClient>, backend: Arc<dyn ApplyBackend>) -> Self {
        Self { client, backend }
    }

    /// Watch `path` with `binding`
    ///
    /// # Errors
    /// Returns [`WatchError::Transport`] if subscribing fails and
    /// [`WatchError::Spawn`] if the dispatch thread cannot start
    pub fn start(&self, path: NodePath, binding: WatchBinding) -> Result<WatchHandle, WatchError> {
        self.launch(path, binding, None, true)
    }

    /// Watch the path given as text
    ///
    /// # Errors
    /// Returns [`WatchError::Construction`] if `path` is not a valid absolute
    /// node path, otherwise as [`start`](Self::start)
    pub fn start_at(&self, path: &str, binding: WatchBinding) -> Result<WatchHandle, WatchError> {
        let path = path.parse::<NodePath>().map_err(ConstructionError::from)?;
        self.start(path, binding)
    }

    /// Watch as described by `config`
    ///
    /// `providers` are used in chain mode and ignored in payload mode.
    ///
    /// # Errors
    /// Returns [`WatchError::Construction`] for chain mode without providers,
    /// otherwise as [`start`](Self::start)
    pub fn start_with_config(
        &self,
        config: &WatchConfig,
        providers: Vec<Arc<dyn ArtifactProvider>>,
        observer: Option<Arc<dyn Observer>>,
    ) -> Result<WatchHandle, WatchError> {
        let mut binding = match config.mode {
            ModeKind::Payload => {
                if !providers.is_empty() {
                    tracing::warn!(
                        "Ignoring {} providers for payload-mode watch on {}",
                        providers.len(),
                        config.path
                    );
                }
                WatchBinding::payload()
            }
            ModeKind::Chain => WatchBinding::chain(providers)?,
        };
        if let Some(observer) = observer {
            binding = binding.with_observer(observer);
        }
        self.launch(
            config.path.clone(),
            binding,
            config.thread_name.clone(),
            config.join_on_stop,
        )
    }

    fn launch(
        &self,
        path: NodePath,
        binding: WatchBinding,
        thread_name: Option<String>,
        join_on_stop: bool,
    ) -> Result<WatchHandle, WatchError> {
        let id = WatchId::new();
        let (events, closer) = self.client.subscribe(&path)?.into_parts();
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);

        let shared = Arc::new(WatchShared {
            path: path.clone(),
            stopped: AtomicBool::new(false),
            running: AtomicBool::new(true),
            routed: AtomicU64::new(0),
            terminal: Mutex::new(None),
        });
        let mode = if binding.is_payload_mode() { "payload" } else { "chain" };
        let router = NodeChangeRouter::new(binding, Arc::clone(&self.backend));

        let pump = Pump {
            events,
            stop: stop_rx,
            router,
            shared: Arc::clone(&shared),
        };
        let thread = thread::Builder::new()
            .name(thread_name.unwrap_or_else(|| format!("hotswap-watch-{}", id.short())))
            .spawn(move || pump.run())?;

        tracing::info!("Started {} watch {} on {}", mode, id, path);
        Ok(WatchHandle {
            id,
            shared,
            closer,
            stop_tx: Mutex::new(Some(stop_tx)),
            thread: Mutex::new(Some(thread)),
            join_on_stop,
        })
    }
}

impl fmt::Debug for CoordinationWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinationWatch").finish_non_exhaustive()
    }
}

struct WatchShared {
    path: NodePath,
    stopped: AtomicBool,
    running: AtomicBool,
    routed: AtomicU64,
    terminal: Mutex<Option<TransportError>>,
}

struct Pump {
    events: Receiver<StreamEvent>,
    stop: Receiver<()>,
    router: NodeChangeRouter,
    shared: Arc<WatchShared>,
}

impl Pump {
    fn run(self) {
        let _running = RunningGuard(&self.shared);
        let mut sel = Select::new();
        let stop = sel.recv(&self.stop);
        sel.recv(&self.events);

        loop {
            let oper = sel.select();
            if oper.index() == stop {
                let _ = oper.recv(&self.stop);
                break;
            }
            match oper.recv(&self.events) {
                Ok(StreamEvent::Change(notification)) => {
                    if self.shared.stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    if notification.kind.is_actionable() {
                        self.router.route(&notification);
                        self.shared.routed.fetch_add(1, Ordering::SeqCst);
                    } else {
                        tracing::debug!("Skipping {:?} on {}", notification.kind, notification.path);
                    }
                }
                Ok(StreamEvent::Terminated(error)) => {
                    if error.is_disconnect() {
                        tracing::warn!("Watch on {} lost its session: {}", self.shared.path, error);
                    } else {
                        tracing::error!("Watch on {} terminated: {}", self.shared.path, error);
                    }
                    *self.shared.terminal.lock() = Some(error);
                    break;
                }
                Err(_) => {
                    if !self.shared.stopped.load(Ordering::SeqCst) {
                        tracing::warn!("Subscription stream for {} closed by client", self.shared.path);
                        *self.shared.terminal.lock() =
                            Some(TransportError::ConnectionLost("subscription stream closed".into()));
                    }
                    break;
                }
            }
        }
    }
}

/// Clears the running flag however the pump exits
struct RunningGuard<'a>(&'a WatchShared);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
    }
}

/// Running watch
///
/// Dropping the handle stops the watch.
pub struct WatchHandle {
    id: WatchId,
    shared: Arc<WatchShared>,
    closer: SubscriptionCloser,
    stop_tx: Mutex<Option<Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    join_on_stop: bool,
}

impl WatchHandle {
    /// Watch ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Watched subtree
    #[inline]
    #[must_use]
    pub fn path(&self) -> &NodePath {
        &self.shared.path
    }

    /// Check if notifications are still being routed
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.shared.stopped.load(Ordering::SeqCst) && self.shared.running.load(Ordering::SeqCst)
    }

    /// Transport error that ended the watch, if any
    #[must_use]
    pub fn terminal_error(&self) -> Option<TransportError> {
        self.shared.terminal.lock().clone()
    }

    /// Added/updated notifications handed to the router so far
    #[must_use]
    pub fn notifications_routed(&self) -> u64 {
        self.shared.routed.load(Ordering::SeqCst)
    }

    /// Stop routing and release the subscription
    ///
    /// Idempotent. Joins the dispatch thread unless join-on-stop is disabled
    /// or this is called from the dispatch thread itself (e.g. by an
    /// observer).
    pub fn stop(&self) {
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        self.closer.close();
        drop(self.stop_tx.lock().take());

        let worker = self.thread.lock().take();
        if let Some(worker) = worker {
            let on_worker = worker.thread().id() == thread::current().id();
            if self.join_on_stop && !on_worker && worker.join().is_err() {
                tracing::error!("Dispatch thread of watch {} panicked", self.id);
            }
        }
        tracing::info!("Stopped watch {} on {}", self.id, self.shared.path);
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("id", &self.id)
            .field("path", &self.shared.path)
            .field("active", &self.is_active())
            .field("routed", &self.notifications_routed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Subscription;
    use hotswap_dispatch::ChangeNotification;
    use hotswap_test_utils::{wait_until, RecordingBackend};
    use std::time::Duration;

    /// Client whose streams the test drives by hand
    #[derive(Default)]
    struct ManualClient {
        senders: Mutex<Vec<Sender<StreamEvent>>>,
        refuse: bool,
    }

    impl CoordinationClient for ManualClient {
        fn subscribe(&self, _: &NodePath) -> Result<Subscription, TransportError> {
            if self.refuse {
                return Err(TransportError::SubscribeFailed("denied".into()));
            }
            let (tx, rx) = channel::unbounded();
            self.senders.lock().push(tx);
            Ok(Subscription::new(rx, SubscriptionCloser::noop()))
        }
    }

    fn path() -> NodePath {
        "/w".parse().unwrap()
    }

    #[test]
    fn watch_id_short_form() {
        let id = WatchId::new();
        assert_eq!(id.short().len(), 8);
        assert_ne!(id, WatchId::new());
    }

    #[test]
    fn subscribe_failure_propagates() {
        let client = Arc::new(ManualClient {
            refuse: true,
            ..ManualClient::default()
        });
        let watch = CoordinationWatch::new(client, Arc::new(RecordingBackend::utf8()));
        assert!(matches!(
            watch.start(path(), WatchBinding::payload()),
            Err(WatchError::Transport(TransportError::SubscribeFailed(_)))
        ));
    }

    #[test]
    fn invalid_path_is_construction_error() {
        let watch = CoordinationWatch::new(Arc::new(ManualClient::default()), Arc::new(RecordingBackend::utf8()));
        assert!(matches!(
            watch.start_at("no-leading-slash", WatchBinding::payload()),
            Err(WatchError::Construction(ConstructionError::InvalidPath(_)))
        ));
        let handle = watch.start_at("/ok", WatchBinding::payload()).unwrap();
        assert_eq!(handle.path().to_string(), "/ok");
    }

    #[test]
    fn stop_does_not_depend_on_client_closing_stream() {
        let client = Arc::new(ManualClient::default());
        let backend = Arc::new(RecordingBackend::utf8());
        let watch = CoordinationWatch::new(client.clone(), backend.clone());
        let handle = watch.start(path(), WatchBinding::payload()).unwrap();

        let tx = client.senders.lock()[0].clone();
        tx.send(StreamEvent::Change(ChangeNotification::updated(path(), b"w.One".to_vec())))
            .unwrap();
        assert!(wait_until(Duration::from_secs(5), || handle.notifications_routed() == 1));

        handle.stop();
        assert!(!handle.is_active());
        // Sender is still alive; nothing further may be routed
        let _ = tx.send(StreamEvent::Change(ChangeNotification::updated(path(), b"w.Two".to_vec())));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(backend.applied(), vec!["w.One".to_string()]);
    }

    #[test]
    fn dropped_stream_is_recorded_as_connection_loss() {
        let client = Arc::new(ManualClient::default());
        let watch = CoordinationWatch::new(client.clone(), Arc::new(RecordingBackend::utf8()));
        let handle = watch.start(path(), WatchBinding::payload()).unwrap();

        client.senders.lock().clear();

        assert!(wait_until(Duration::from_secs(5), || !handle.is_active()));
        assert!(matches!(handle.terminal_error(), Some(TransportError::ConnectionLost(_))));
    }
}
