pub mod api;
pub mod backoff;
pub mod config;
pub mod event;
pub mod kind;
pub mod manager;
pub mod state;
pub mod watcher;

pub use api::{EventStream, KubeResourceClient, ResourceClient, Snapshot};
pub use backoff::Backoff;
pub use config::{BackoffConfig, WatchConfig};
pub use event::{WatchError, WatchEvent, WatchEventKind, WatchFailure};
pub use kind::{HasIdentity, HasVersionMarker, KindDescriptor, ResourceKind};
pub use manager::WatchManager;
pub use state::ConnectionState;
pub use watcher::ResourceWatcher;
