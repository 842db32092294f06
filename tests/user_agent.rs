use kubewatch::k8s::client::{add_user_agent_header, resolve_user_agent};
use kubewatch::k8s::{USER_AGENT, USER_AGENT_ENV};

// one test so the environment is never touched concurrently
#[test]
fn test_user_agent_env_override() {
    // SAFETY: the only test in this binary
    unsafe { std::env::set_var(USER_AGENT_ENV, "ops-dashboard/2.1") };
    assert_eq!(resolve_user_agent(Some("kubewatch-test/1.0")), "ops-dashboard/2.1");

    let mut config = kube::Config::new("http://localhost:8080".parse().unwrap());
    add_user_agent_header(&mut config, None);
    assert_eq!(config.headers.len(), 1);
    assert_eq!(config.headers[0].1, "ops-dashboard/2.1");

    // blank overrides are ignored
    unsafe { std::env::set_var(USER_AGENT_ENV, "   ") };
    assert_eq!(resolve_user_agent(None), USER_AGENT);

    unsafe { std::env::remove_var(USER_AGENT_ENV) };
    assert!(USER_AGENT.starts_with("kubewatch/"));
}
