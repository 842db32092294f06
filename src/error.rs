use crate::k8s::watch::ResourceKind;
use derive_more::From;
use k8s_openapi::serde_json;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Json(serde_json::Error),

    #[from]
    Kube(kube::Error),

    #[from]
    Infer(kube::config::InferConfigError),

    #[from]
    Io(std::io::Error),

    /// The API client has no way to list or watch this kind
    UnsupportedKind(ResourceKind),

    /// A per-kind operation was requested for a kind that is not being watched
    NotWatching(ResourceKind),

    /// Custom error message
    Custom(String),
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        match self {
            Self::UnsupportedKind(kind) => write!(fmt, "unsupported resource kind: {kind}"),
            Self::NotWatching(kind) => write!(fmt, "not watching resource kind: {kind}"),
            Self::Custom(msg) => write!(fmt, "{msg}"),
            _ => write!(fmt, "{self:?}"),
        }
    }
}

impl std::error::Error for Error {}
