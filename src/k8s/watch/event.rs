use super::kind::{HasIdentity, HasVersionMarker, ResourceKind};
use chrono::{DateTime, Utc};
use kube::api::DynamicObject;
use kube::error::ErrorResponse;
use serde::Serialize;
use std::fmt;

/// Kind of change carried by a [`WatchEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WatchEventKind {
    Added,
    Modified,
    Deleted,
    Bookmark,
    Error,
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Added => "ADDED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
            Self::Bookmark => "BOOKMARK",
            Self::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// A normalized change to one object of one resource kind
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: ResourceKind,
    pub event: WatchEventKind,
    pub object: DynamicObject,
    pub received_at: DateTime<Utc>,
}

impl WatchEvent {
    #[must_use]
    pub fn new(kind: ResourceKind, event: WatchEventKind, object: DynamicObject) -> Self {
        Self {
            kind,
            event,
            object,
            received_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.object.namespace_name().0
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.object.namespace_name().1
    }

    #[must_use]
    pub fn resource_version(&self) -> Option<&str> {
        self.object.version_marker()
    }
}

/// Why a list or watch call failed, classified for recovery
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchFailure {
    /// The API server answered with a failure status
    #[error("api error {code} ({reason}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    /// The version marker is too old; only a fresh list can recover
    #[error("resource version expired: {message}")]
    Expired { message: String },

    /// Transport-level failure: connection reset, decode error, timeout
    #[error("transport error: {0}")]
    Transport(String),

    /// A list answered without a resource version, so there is nothing to watch from
    #[error("list returned no resource version")]
    MissingVersion,
}

const HTTP_UNAUTHORIZED: u16 = 401;
const HTTP_FORBIDDEN: u16 = 403;
const HTTP_NOT_FOUND: u16 = 404;
const HTTP_GONE: u16 = 410;

impl WatchFailure {
    /// Unauthorized, forbidden or not-found: retrying cannot help
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Api {
                code: HTTP_UNAUTHORIZED | HTTP_FORBIDDEN | HTTP_NOT_FOUND,
                ..
            }
        )
    }

    #[must_use]
    pub const fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }

    /// Classify a status object, either from an API response or from an
    /// `ERROR` event inside a watch stream
    #[must_use]
    pub fn from_status(status: &ErrorResponse) -> Self {
        if status.code == HTTP_GONE || status.reason == "Expired" || status.reason == "Gone" {
            return Self::Expired {
                message: status.message.clone(),
            };
        }
        Self::Api {
            code: status.code,
            reason: status.reason.clone(),
            message: status.message.clone(),
        }
    }
}

impl From<&kube::Error> for WatchFailure {
    fn from(err: &kube::Error) -> Self {
        match err {
            kube::Error::Api(status) => Self::from_status(status),
            kube::Error::Auth(e) => Self::Api {
                code: HTTP_UNAUTHORIZED,
                reason: "Unauthorized".to_string(),
                message: e.to_string(),
            },
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<kube::Error> for WatchFailure {
    fn from(err: kube::Error) -> Self {
        Self::from(&err)
    }
}

/// A failure reported by one watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchError {
    pub kind: ResourceKind,
    pub error: WatchFailure,
    /// The watcher has stopped and will not retry on its own
    pub fatal: bool,
}

impl WatchError {
    #[must_use]
    pub fn new(kind: ResourceKind, error: WatchFailure) -> Self {
        let fatal = error.is_fatal();
        Self { kind, error, fatal }
    }
}

impl fmt::Display for WatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = if self.fatal { "fatal" } else { "transient" };
        write!(f, "{} watch {severity}: {}", self.kind, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, reason: &str) -> ErrorResponse {
        ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{reason} happened"),
            reason: reason.to_string(),
            code,
        }
    }

    #[test]
    fn test_fatal_codes() {
        for code in [401, 403, 404] {
            let failure = WatchFailure::from(kube::Error::Api(status(code, "Nope")));
            assert!(failure.is_fatal(), "{code} should be fatal");
            assert!(WatchError::new(ResourceKind::Pods, failure).fatal);
        }
    }

    #[test]
    fn test_transient_codes() {
        for code in [409, 429, 500, 503] {
            let failure = WatchFailure::from(kube::Error::Api(status(code, "Busy")));
            assert!(!failure.is_fatal(), "{code} should be transient");
            assert!(!failure.is_expired());
        }
        assert!(!WatchFailure::MissingVersion.is_fatal());
        assert!(!WatchFailure::MissingVersion.is_expired());
    }

    #[test]
    fn test_gone_is_expired_not_fatal() {
        let by_code = WatchFailure::from_status(&status(410, "Whatever"));
        assert!(by_code.is_expired());
        assert!(!by_code.is_fatal());

        let by_reason = WatchFailure::from_status(&status(500, "Expired"));
        assert!(by_reason.is_expired());
    }

    #[test]
    fn test_watch_error_display() {
        let err = WatchError::new(
            ResourceKind::Services,
            WatchFailure::Transport("connection reset".to_string()),
        );
        assert_eq!(err.to_string(), "services watch transient: transport error: connection reset");
    }
}
