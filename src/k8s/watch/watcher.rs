/**
 * List-watch worker for a single resource kind in a single namespace.
 *
 * The task snapshots with `list`, streams changes with `watch` from the
 * snapshot's resource version, and reconnects with backoff until it is
 * cancelled or hits a fatal error.
 */
use super::api::{EventStream, ResourceClient};
use super::backoff::Backoff;
use super::config::WatchConfig;
use super::event::{WatchError, WatchEvent, WatchEventKind, WatchFailure};
use super::kind::{HasIdentity, HasVersionMarker, ResourceKind};
use super::state::ConnectionState;
use crate::error::Result;
use futures::StreamExt;
use kube::api::{DynamicObject, WatchEvent as RawWatchEvent};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

/// Owns the watch lifecycle for one `(kind, namespace)` pair
pub struct ResourceWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    kind: ResourceKind,
    namespace: String,
    client: Arc<dyn ResourceClient>,
    backoff: Backoff,
    reconnect_floor: Duration,
    span: Span,
    status: Mutex<WatcherStatus>,
}

#[derive(Default)]
struct WatcherStatus {
    resource_version: String,
    state: ConnectionState,
    debug: bool,
    run: Option<Run>,
}

struct Run {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ResourceWatcher {
    /// Create a stopped watcher
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedKind` if the client cannot serve `kind`
    pub fn new(
        kind: ResourceKind,
        namespace: impl Into<String>,
        client: Arc<dyn ResourceClient>,
        config: &WatchConfig,
    ) -> Result<Self> {
        client.ensure_supported(kind)?;
        let namespace = namespace.into();
        let span = info_span!(parent: &config.span, "watcher", kind = %kind, namespace = %namespace);

        Ok(Self {
            inner: Arc::new(WatcherInner {
                kind,
                namespace,
                client,
                backoff: Backoff::new(config.backoff.clone()),
                reconnect_floor: config.reconnect_floor,
                span,
                status: Mutex::new(WatcherStatus::default()),
            }),
        })
    }

    /// Spawn the watch task. Calling this while the task is running is a no-op.
    pub fn start(&self, events: mpsc::Sender<WatchEvent>, errors: mpsc::Sender<WatchError>) {
        let mut status = self.inner.status();
        if status.run.as_ref().is_some_and(|run| !run.handle.is_finished()) {
            debug!(parent: &self.inner.span, "watcher already running");
            return;
        }

        let token = CancellationToken::new();
        let task = WatchTask {
            inner: self.inner.clone(),
            events,
            errors,
            token: token.clone(),
            known: BTreeSet::new(),
        };
        let handle = tokio::spawn(task.run().instrument(self.inner.span.clone()));
        status.run = Some(Run { token, handle });
    }

    /// Cancel the watch task and wait for it to exit.
    ///
    /// Once this returns the watcher is `Disconnected` and will not send again.
    pub async fn stop(&self) {
        let run = self.inner.status().run.take();
        if let Some(run) = run {
            run.token.cancel();
            if let Err(e) = run.handle.await {
                if e.is_panic() {
                    error!(parent: &self.inner.span, "watch task panicked: {e}");
                }
            }
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.status().state
    }

    /// Last resource version seen; empty means the next step is a fresh list
    #[must_use]
    pub fn resource_version(&self) -> String {
        self.inner.resource_version()
    }

    pub fn set_debug_mode(&self, debug: bool) {
        self.inner.status().debug = debug;
    }

    #[must_use]
    pub fn debug_mode(&self) -> bool {
        self.inner.status().debug
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner
            .status()
            .run
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Consecutive failed attempts since the last successful connect
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.inner.backoff.attempts()
    }

    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.inner.kind
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }
}

impl Drop for ResourceWatcher {
    fn drop(&mut self) {
        if let Some(run) = self.inner.status().run.take() {
            run.token.cancel();
        }
    }
}

impl WatcherInner {
    fn status(&self) -> MutexGuard<'_, WatcherStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        self.status().state = state;
    }

    fn resource_version(&self) -> String {
        self.status().resource_version.clone()
    }

    fn set_resource_version(&self, version: &str) {
        self.status().resource_version = version.to_string();
    }

    fn debug(&self) -> bool {
        self.status().debug
    }
}

/// Why the run loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Cancelled,
    Fatal,
    ConsumerGone,
}

enum StreamEnd {
    /// Server ended the stream without an error
    Closed,
    Failed(WatchFailure),
    Exit(Exit),
}

/// Identity of an object within one kind
type ObjectKey = (Option<String>, String);

fn object_key(obj: &DynamicObject) -> Option<ObjectKey> {
    let (namespace, name) = obj.namespace_name();
    name.map(|name| (namespace.map(str::to_string), name.to_string()))
}

/// Minimal object standing in for one that vanished between two snapshots
fn tombstone(kind: ResourceKind, (namespace, name): ObjectKey) -> DynamicObject {
    let mut obj = DynamicObject::new(&name, &kind.api_resource());
    obj.metadata.namespace = namespace;
    obj
}

/// State owned by the spawned task
struct WatchTask {
    inner: Arc<WatcherInner>,
    events: mpsc::Sender<WatchEvent>,
    errors: mpsc::Sender<WatchError>,
    token: CancellationToken,
    /// Objects the consumer currently believes exist
    known: BTreeSet<ObjectKey>,
}

impl WatchTask {
    async fn run(mut self) {
        info!("watcher started");
        match self.run_loop().await {
            Exit::Cancelled => {
                self.inner.set_state(ConnectionState::Disconnected);
                info!("watcher stopped");
            }
            Exit::ConsumerGone => {
                self.inner.set_state(ConnectionState::Disconnected);
                warn!("event queue closed, watcher exiting");
            }
            Exit::Fatal => info!("watcher halted, restart required"),
        }
    }

    async fn run_loop(&mut self) -> Exit {
        let inner = self.inner.clone();
        let kind = inner.kind;
        let namespace = inner.namespace.as_str();

        loop {
            if self.token.is_cancelled() {
                return Exit::Cancelled;
            }

            if inner.resource_version().is_empty() {
                inner.set_state(ConnectionState::Connecting);
                let listed = tokio::select! {
                    biased;
                    () = self.token.cancelled() => return Exit::Cancelled,
                    listed = inner.client.list(kind, namespace) => listed,
                };
                let snapshot = match listed {
                    Ok(snapshot) => snapshot,
                    Err(e) => match self.fail(WatchFailure::from(&e)).await {
                        Some(exit) => return exit,
                        None => continue,
                    },
                };
                // watching from "" would start at an arbitrary point
                if snapshot.resource_version.is_empty() {
                    match self.fail(WatchFailure::MissingVersion).await {
                        Some(exit) => return exit,
                        None => continue,
                    }
                }

                info!(
                    resource_version = %snapshot.resource_version,
                    items = snapshot.items.len(),
                    "snapshot loaded"
                );
                inner.set_resource_version(&snapshot.resource_version);
                if let Some(exit) = self.replay(snapshot.items).await {
                    return exit;
                }
            }

            inner.set_state(ConnectionState::Connecting);
            let resource_version = inner.resource_version();
            let opened = tokio::select! {
                biased;
                () = self.token.cancelled() => return Exit::Cancelled,
                opened = inner.client.watch(kind, namespace, &resource_version) => opened,
            };
            let stream = match opened {
                Ok(stream) => stream,
                Err(e) => match self.fail(WatchFailure::from(&e)).await {
                    Some(exit) => return exit,
                    None => continue,
                },
            };

            inner.set_state(ConnectionState::Connected);
            inner.backoff.reset();
            debug!(%resource_version, "watch stream established");

            match self.consume(stream).await {
                StreamEnd::Closed => {
                    info!("watch stream closed by server, reconnecting");
                    if !self.pause(inner.reconnect_floor).await {
                        return Exit::Cancelled;
                    }
                }
                StreamEnd::Failed(failure) => {
                    if let Some(exit) = self.fail(failure).await {
                        return exit;
                    }
                }
                StreamEnd::Exit(exit) => return exit,
            }
        }
    }

    /// Emit a snapshot as additions, then a deletion for every object the
    /// consumer saw before that the snapshot no longer contains
    async fn replay(&mut self, items: Vec<DynamicObject>) -> Option<Exit> {
        let kind = self.inner.kind;
        let previous = std::mem::take(&mut self.known);

        for item in items {
            if let Some(key) = object_key(&item) {
                self.known.insert(key);
            }
            let event = WatchEvent::new(kind, WatchEventKind::Added, item);
            if let Some(exit) = self.emit(event).await {
                return Some(exit);
            }
        }

        let vanished: Vec<ObjectKey> = previous
            .into_iter()
            .filter(|key| !self.known.contains(key))
            .collect();
        if !vanished.is_empty() {
            info!(count = vanished.len(), "objects gone since the last snapshot");
        }
        for key in vanished {
            let event = WatchEvent::new(kind, WatchEventKind::Deleted, tombstone(kind, key));
            if let Some(exit) = self.emit(event).await {
                return Some(exit);
            }
        }
        None
    }

    /// Forward stream events until the stream ends, fails or we are cancelled
    async fn consume(&mut self, mut stream: EventStream) -> StreamEnd {
        loop {
            let next = tokio::select! {
                biased;
                () = self.token.cancelled() => return StreamEnd::Exit(Exit::Cancelled),
                next = stream.next() => next,
            };

            let (event_kind, object) = match next {
                None => return StreamEnd::Closed,
                Some(Err(e)) => return StreamEnd::Failed(WatchFailure::from(&e)),
                Some(Ok(RawWatchEvent::Added(obj))) => (WatchEventKind::Added, obj),
                Some(Ok(RawWatchEvent::Modified(obj))) => (WatchEventKind::Modified, obj),
                Some(Ok(RawWatchEvent::Deleted(obj))) => (WatchEventKind::Deleted, obj),
                Some(Ok(RawWatchEvent::Bookmark(bookmark))) => {
                    let version = bookmark.metadata.resource_version;
                    if version.is_empty() {
                        debug!("ignoring bookmark without resource version");
                    } else {
                        if self.inner.debug() {
                            debug!(resource_version = %version, "bookmark");
                        }
                        self.inner.set_resource_version(&version);
                    }
                    continue;
                }
                Some(Ok(RawWatchEvent::Error(status))) => {
                    return StreamEnd::Failed(WatchFailure::from_status(&status));
                }
            };

            if let Some(version) = object.version_marker() {
                self.inner.set_resource_version(version);
            }
            if self.inner.debug() {
                debug!(
                    event = %event_kind,
                    object = %object.display_name(),
                    resource_version = object.version_marker().unwrap_or_default(),
                    "watch event"
                );
            }
            if let Some(key) = object_key(&object) {
                if event_kind == WatchEventKind::Deleted {
                    self.known.remove(&key);
                } else {
                    self.known.insert(key);
                }
            }

            let event = WatchEvent::new(self.inner.kind, event_kind, object);
            if let Some(exit) = self.emit(event).await {
                return StreamEnd::Exit(exit);
            }
        }
    }

    /// Report a failure and decide what comes next. `None` means loop again.
    async fn fail(&self, failure: WatchFailure) -> Option<Exit> {
        let err = WatchError::new(self.inner.kind, failure);

        if err.fatal {
            self.inner.set_state(ConnectionState::Error);
            error!(error = %err.error, "fatal watch error");
            return Some(self.report(err).await.unwrap_or(Exit::Fatal));
        }

        self.inner.set_state(ConnectionState::Reconnecting);
        let backoff_delay = self.inner.backoff.next();
        let attempt = self.inner.backoff.attempts();

        let delay = if err.error.is_expired() && !self.inner.resource_version().is_empty() {
            self.inner.set_resource_version("");
            // first expiry after a healthy stream relists at once; repeats back off
            let delay = if attempt == 1 {
                self.inner.reconnect_floor
            } else {
                backoff_delay
            };
            warn!(
                error = %err.error,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "resource version expired, relisting"
            );
            delay
        } else {
            warn!(
                error = %err.error,
                attempt,
                delay_ms = u64::try_from(backoff_delay.as_millis()).unwrap_or(u64::MAX),
                "watch failed, retrying"
            );
            backoff_delay
        };
        if let Some(exit) = self.report(err).await {
            return Some(exit);
        }

        if self.pause(delay).await {
            None
        } else {
            Some(Exit::Cancelled)
        }
    }

    /// Queue an event, giving up if the watcher is cancelled first
    async fn emit(&self, event: WatchEvent) -> Option<Exit> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Some(Exit::Cancelled),
            sent = self.events.send(event) => sent.err().map(|_| Exit::ConsumerGone),
        }
    }

    /// Queue an error. Transient ones are dropped when the queue is full so a
    /// stalled consumer cannot stall the watch; a fatal one waits for room.
    async fn report(&self, err: WatchError) -> Option<Exit> {
        if err.fatal {
            return tokio::select! {
                biased;
                () = self.token.cancelled() => Some(Exit::Cancelled),
                _ = self.errors.send(err) => None,
            };
        }
        match self.errors.try_send(err) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(err)) => warn!("error queue full, dropping: {err}"),
        }
        None
    }

    /// Sleep unless cancelled; `false` means cancelled
    async fn pause(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.token.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}
