/**
 * List/watch access to the cluster, one seam for every resource kind.
 *
 * Watchers only talk to `ResourceClient`; `KubeResourceClient` is the real
 * implementation over `kube::Api<DynamicObject>`.
 */
use super::config::WATCH_TIMEOUT_SECONDS;
use super::kind::ResourceKind;
use crate::error::Result;
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use kube::Client;
use kube::api::{Api, DynamicObject, ListParams, WatchEvent, WatchParams};
use tracing::debug;

/// A consistent listing plus the version marker to resume watching from
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub items: Vec<DynamicObject>,
    pub resource_version: String,
}

/// Raw change stream as produced by the API server
pub type EventStream = BoxStream<'static, core::result::Result<WatchEvent<DynamicObject>, kube::Error>>;

#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// Full listing of `kind` in `namespace` (empty namespace = all namespaces)
    async fn list(&self, kind: ResourceKind, namespace: &str) -> core::result::Result<Snapshot, kube::Error>;

    /// Open a change stream starting after `resource_version`
    async fn watch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        resource_version: &str,
    ) -> core::result::Result<EventStream, kube::Error>;

    /// Reject kinds this client cannot serve before a watcher is built for them
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedKind` when the kind cannot be listed or watched
    fn ensure_supported(&self, _kind: ResourceKind) -> Result<()> {
        Ok(())
    }
}

/// `ResourceClient` backed by a live cluster
#[derive(Clone)]
pub struct KubeResourceClient {
    client: Client,
}

impl KubeResourceClient {
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the inferred kubeconfig with the crate user agent
    ///
    /// # Errors
    ///
    /// Will return `Err` if no cluster configuration can be found
    pub async fn try_default() -> Result<Self> {
        let client = crate::k8s::client::new(Some(crate::k8s::USER_AGENT)).await?;
        Ok(Self::new(client))
    }

    fn api(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
        let ar = kind.api_resource();
        if namespace.is_empty() {
            Api::all_with(self.client.clone(), &ar)
        } else {
            Api::namespaced_with(self.client.clone(), namespace, &ar)
        }
    }
}

#[async_trait]
impl ResourceClient for KubeResourceClient {
    async fn list(&self, kind: ResourceKind, namespace: &str) -> core::result::Result<Snapshot, kube::Error> {
        let list = self.api(kind, namespace).list(&ListParams::default()).await?;
        let resource_version = list.metadata.resource_version.unwrap_or_default();
        debug!(%kind, namespace, %resource_version, items = list.items.len(), "listed");
        Ok(Snapshot {
            items: list.items,
            resource_version,
        })
    }

    async fn watch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        resource_version: &str,
    ) -> core::result::Result<EventStream, kube::Error> {
        let wp = WatchParams::default().timeout(WATCH_TIMEOUT_SECONDS);
        let stream = self.api(kind, namespace).watch(&wp, resource_version).await?;
        Ok(stream.boxed())
    }
}
