#![allow(dead_code)]
//! Scripted in-memory `ResourceClient` for driving watchers without a cluster.

use async_trait::async_trait;
use futures::StreamExt;
use k8s_openapi::serde_json::{self, json};
use kube::api::{DynamicObject, WatchEvent};
use kube::error::ErrorResponse;
use kubewatch::error::{Error, Result};
use kubewatch::k8s::watch::{
    BackoffConfig, EventStream, ResourceClient, ResourceKind, Snapshot, WatchConfig,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type RawEvent = core::result::Result<WatchEvent<DynamicObject>, kube::Error>;

pub enum ListStep {
    Ok(Vec<DynamicObject>, &'static str),
    Err(kube::Error),
}

pub enum WatchStep {
    /// Deliver the events, then end the stream cleanly
    Close(Vec<RawEvent>),
    /// Deliver the events, then stay open forever
    Open(Vec<RawEvent>),
    Err(kube::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List { kind: ResourceKind, namespace: String },
    Watch { kind: ResourceKind, namespace: String, version: String },
}

#[derive(Default)]
struct Script {
    lists: VecDeque<ListStep>,
    watches: VecDeque<WatchStep>,
}

#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<ResourceKind, Script>>,
    calls: Mutex<Vec<Call>>,
    unsupported: Mutex<HashSet<ResourceKind>>,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_list(&self, kind: ResourceKind, step: ListStep) {
        self.scripts.lock().unwrap().entry(kind).or_default().lists.push_back(step);
    }

    pub fn push_watch(&self, kind: ResourceKind, step: WatchStep) {
        self.scripts.lock().unwrap().entry(kind).or_default().watches.push_back(step);
    }

    pub fn reject(&self, kind: ResourceKind) {
        self.unsupported.lock().unwrap().insert(kind);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, kind: ResourceKind) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| match c {
                Call::List { kind: k, .. } | Call::Watch { kind: k, .. } => *k == kind,
            })
            .collect()
    }

    pub fn watch_count(&self, kind: ResourceKind) -> usize {
        self.calls_for(kind)
            .iter()
            .filter(|c| matches!(c, Call::Watch { .. }))
            .count()
    }
}

#[async_trait]
impl ResourceClient for ScriptedClient {
    async fn list(&self, kind: ResourceKind, namespace: &str) -> core::result::Result<Snapshot, kube::Error> {
        self.calls.lock().unwrap().push(Call::List {
            kind,
            namespace: namespace.to_string(),
        });
        let step = self
            .scripts
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .lists
            .pop_front();
        match step {
            Some(ListStep::Ok(items, version)) => Ok(Snapshot {
                items,
                resource_version: version.to_string(),
            }),
            Some(ListStep::Err(e)) => Err(e),
            // out of script: park like a slow API server
            None => futures::future::pending().await,
        }
    }

    async fn watch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        resource_version: &str,
    ) -> core::result::Result<EventStream, kube::Error> {
        self.calls.lock().unwrap().push(Call::Watch {
            kind,
            namespace: namespace.to_string(),
            version: resource_version.to_string(),
        });
        let step = self
            .scripts
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .watches
            .pop_front();
        match step {
            Some(WatchStep::Close(events)) => Ok(futures::stream::iter(events).boxed()),
            Some(WatchStep::Open(events)) => Ok(open_stream(events)),
            Some(WatchStep::Err(e)) => Err(e),
            None => Ok(open_stream(Vec::new())),
        }
    }

    fn ensure_supported(&self, kind: ResourceKind) -> Result<()> {
        if self.unsupported.lock().unwrap().contains(&kind) {
            return Err(Error::UnsupportedKind(kind));
        }
        Ok(())
    }
}

fn open_stream(events: Vec<RawEvent>) -> EventStream {
    futures::stream::iter(events)
        .chain(futures::stream::pending())
        .boxed()
}

pub fn object(kind: &str, name: &str, namespace: &str, version: &str) -> DynamicObject {
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": kind,
        "metadata": {"name": name, "namespace": namespace, "resourceVersion": version}
    }))
    .unwrap()
}

pub fn pod(name: &str, version: &str) -> DynamicObject {
    object("Pod", name, "default", version)
}

pub fn added(obj: DynamicObject) -> RawEvent {
    Ok(WatchEvent::Added(obj))
}

pub fn modified(obj: DynamicObject) -> RawEvent {
    Ok(WatchEvent::Modified(obj))
}

pub fn deleted(obj: DynamicObject) -> RawEvent {
    Ok(WatchEvent::Deleted(obj))
}

pub fn bookmark(version: &str) -> RawEvent {
    Ok(serde_json::from_value(json!({
        "type": "BOOKMARK",
        "object": {"apiVersion": "v1", "kind": "Pod", "metadata": {"resourceVersion": version}}
    }))
    .unwrap())
}

pub fn error_event(code: u16, reason: &str) -> RawEvent {
    Ok(WatchEvent::Error(status(code, reason)))
}

pub fn status(code: u16, reason: &str) -> ErrorResponse {
    ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{reason} from test"),
        reason: reason.to_string(),
        code,
    }
}

pub fn api_error(code: u16, reason: &str) -> kube::Error {
    kube::Error::Api(status(code, reason))
}

/// Tiny delays and no jitter so retry paths run quickly and predictably
pub fn fast_config() -> WatchConfig {
    WatchConfig {
        backoff: BackoffConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
            multiplier: 2.0,
            jitter: 0.0,
        },
        reconnect_floor: Duration::ZERO,
        ..WatchConfig::default()
    }
}

/// A retry delay long enough that a test will only ever see it cut short
pub fn slow_config() -> WatchConfig {
    WatchConfig {
        backoff: BackoffConfig {
            initial_delay: Duration::from_secs(3600),
            max_delay: Duration::from_secs(3600),
            multiplier: 2.0,
            jitter: 0.0,
        },
        ..fast_config()
    }
}

/// Poll `check` until it is true or five seconds pass
pub async fn wait_until<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..500 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Async flavour of `wait_until`, for checks that need to await
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Receive with a timeout so a broken watcher fails the test instead of hanging it
pub async fn recv<T>(rx: &mut tokio::sync::mpsc::Receiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for queue item")
        .expect("queue closed")
}
