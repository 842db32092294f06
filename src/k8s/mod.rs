pub mod client;
pub mod watch;

/// Default user agent for `kubewatch` - automatically uses the package version
///
/// All API traffic goes through `client::new(Some(USER_AGENT))`. The value can
/// be overridden with the `KUBEWATCH_USER_AGENT` environment variable.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Environment variable that overrides [`USER_AGENT`]
pub const USER_AGENT_ENV: &str = "KUBEWATCH_USER_AGENT";
