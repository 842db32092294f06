/**
 * K8s Watch Manager
 *
 * Supervises one `ResourceWatcher` per resource kind, funnels their output
 * into a shared event queue and a shared error queue, and derives one
 * connection state for the UI.
 */
use super::api::ResourceClient;
use super::config::WatchConfig;
use super::event::{WatchError, WatchEvent};
use super::kind::ResourceKind;
use super::state::ConnectionState;
use super::watcher::ResourceWatcher;
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, error, info};

/// Receiving ends of the shared queues, each handed out once
struct Receivers {
    events: Option<mpsc::Receiver<WatchEvent>>,
    errors: Option<mpsc::Receiver<WatchError>>,
}

struct ManagerState {
    watchers: HashMap<ResourceKind, ResourceWatcher>,
    namespace: String,
    debug: bool,
}

/// Manages the set of resource watchers for one client session
pub struct WatchManager {
    client: Arc<dyn ResourceClient>,
    config: WatchConfig,
    state: RwLock<ManagerState>,
    event_tx: mpsc::Sender<WatchEvent>,
    error_tx: mpsc::Sender<WatchError>,
    receivers: Mutex<Receivers>,
}

impl WatchManager {
    #[must_use]
    pub fn new(client: Arc<dyn ResourceClient>, namespace: impl Into<String>) -> Self {
        Self::with_config(client, namespace, WatchConfig::default())
    }

    #[must_use]
    pub fn with_config(
        client: Arc<dyn ResourceClient>,
        namespace: impl Into<String>,
        config: WatchConfig,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_queue_capacity);
        let (error_tx, error_rx) = mpsc::channel(config.error_queue_capacity);

        Self {
            client,
            config,
            state: RwLock::new(ManagerState {
                watchers: HashMap::new(),
                namespace: namespace.into(),
                debug: false,
            }),
            event_tx,
            error_tx,
            receivers: Mutex::new(Receivers {
                events: Some(event_rx),
                errors: Some(error_rx),
            }),
        }
    }

    /// Start watchers for every kind not already watched.
    ///
    /// # Errors
    ///
    /// If any watcher cannot be created, the watchers started by this call are
    /// stopped again and the error is returned.
    pub async fn start(&self, kinds: &[ResourceKind]) -> Result<()> {
        let mut state = self.state.write().await;
        self.start_locked(&mut state, kinds).await
    }

    /// Stop every watcher and forget them
    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        Self::stop_locked(&mut state).await;
    }

    /// Replace the watcher for `kind` with a fresh one, forcing a new snapshot
    ///
    /// # Errors
    ///
    /// Returns `Error::NotWatching` if `kind` has no watcher, or the creation error
    pub async fn restart_watcher(&self, kind: ResourceKind) -> Result<()> {
        let mut state = self.state.write().await;
        let Some(old) = state.watchers.remove(&kind) else {
            return Err(Error::NotWatching(kind));
        };
        old.stop().await;
        drop(old);

        info!(%kind, "restarting watcher");
        let watcher = self.spawn_watcher(kind, &state.namespace, state.debug)?;
        state.watchers.insert(kind, watcher);
        Ok(())
    }

    /// Stop everything and start the same set of kinds again
    ///
    /// # Errors
    ///
    /// Returns the creation error of the first watcher that fails
    pub async fn restart_all(&self) -> Result<()> {
        let mut state = self.state.write().await;
        self.restart_locked(&mut state).await
    }

    /// Switch namespace and restart every watcher in it
    ///
    /// # Errors
    ///
    /// Returns the creation error of the first watcher that fails
    pub async fn update_namespace(&self, namespace: impl Into<String>) -> Result<()> {
        let namespace = namespace.into();
        let mut state = self.state.write().await;
        info!(from = %state.namespace, to = %namespace, "switching namespace");
        state.namespace = namespace;
        self.restart_locked(&mut state).await
    }

    async fn restart_locked(&self, state: &mut ManagerState) -> Result<()> {
        let mut kinds: Vec<ResourceKind> = state.watchers.keys().copied().collect();
        kinds.sort();
        Self::stop_locked(state).await;
        self.start_locked(state, &kinds).await
    }

    async fn start_locked(&self, state: &mut ManagerState, kinds: &[ResourceKind]) -> Result<()> {
        let mut started: Vec<ResourceKind> = Vec::new();

        for &kind in kinds {
            if state.watchers.contains_key(&kind) {
                continue;
            }
            match self.spawn_watcher(kind, &state.namespace, state.debug) {
                Ok(watcher) => {
                    state.watchers.insert(kind, watcher);
                    started.push(kind);
                }
                Err(e) => {
                    error!(%kind, "failed to start watcher: {e}");
                    for kind in started {
                        if let Some(watcher) = state.watchers.remove(&kind) {
                            watcher.stop().await;
                        }
                    }
                    return Err(e);
                }
            }
        }

        if !started.is_empty() {
            info!(namespace = %state.namespace, kinds = ?started, "🔍 watch streams started");
        }
        Ok(())
    }

    async fn stop_locked(state: &mut ManagerState) {
        let watchers: Vec<ResourceWatcher> = state.watchers.drain().map(|(_, w)| w).collect();
        if watchers.is_empty() {
            return;
        }
        let count = watchers.len();
        futures::future::join_all(watchers.iter().map(ResourceWatcher::stop)).await;
        info!(count, "watch streams stopped");
    }

    fn spawn_watcher(&self, kind: ResourceKind, namespace: &str, debug: bool) -> Result<ResourceWatcher> {
        let watcher = ResourceWatcher::new(kind, namespace, self.client.clone(), &self.config)?;
        watcher.set_debug_mode(debug);
        watcher.start(self.event_tx.clone(), self.error_tx.clone());
        Ok(watcher)
    }

    /// Take the receiving end of the shared event queue; only the first call gets it
    pub fn take_event_queue(&self) -> Option<mpsc::Receiver<WatchEvent>> {
        self.receivers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .take()
    }

    /// Take the receiving end of the shared error queue; only the first call gets it
    pub fn take_error_queue(&self) -> Option<mpsc::Receiver<WatchError>> {
        self.receivers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .errors
            .take()
    }

    pub async fn connection_states(&self) -> BTreeMap<ResourceKind, ConnectionState> {
        let state = self.state.read().await;
        state
            .watchers
            .iter()
            .map(|(kind, watcher)| (*kind, watcher.state()))
            .collect()
    }

    pub async fn overall_connection_state(&self) -> ConnectionState {
        let state = self.state.read().await;
        ConnectionState::aggregate(state.watchers.values().map(ResourceWatcher::state))
    }

    pub async fn resource_versions(&self) -> BTreeMap<ResourceKind, String> {
        let state = self.state.read().await;
        state
            .watchers
            .iter()
            .map(|(kind, watcher)| (*kind, watcher.resource_version()))
            .collect()
    }

    pub async fn is_watching(&self, kind: ResourceKind) -> bool {
        self.state.read().await.watchers.contains_key(&kind)
    }

    pub async fn watcher_count(&self) -> usize {
        self.state.read().await.watchers.len()
    }

    pub async fn watched_kinds(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<_> = self.state.read().await.watchers.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub async fn namespace(&self) -> String {
        self.state.read().await.namespace.clone()
    }

    /// Toggle verbose per-event logging on current and future watchers
    pub async fn set_debug_mode(&self, enabled: bool) {
        let mut state = self.state.write().await;
        state.debug = enabled;
        for watcher in state.watchers.values() {
            watcher.set_debug_mode(enabled);
        }
        debug!(enabled, "debug mode updated");
    }

    pub async fn debug_mode(&self) -> bool {
        self.state.read().await.debug
    }
}
