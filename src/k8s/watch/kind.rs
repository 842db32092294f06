/**
 * Resource kinds the watch subsystem knows how to list and watch.
 *
 * Every kind is a row in `DESCRIPTORS`; list/watch are generic over the
 * row's `ApiResource`, and version/identity extraction goes through the
 * capability traits below instead of per-kind matching.
 */
use clap::ValueEnum;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Event, Pod, Service};
use k8s_openapi::serde_json::Value;
use kube::api::{ApiResource, DynamicObject};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize)]
pub enum ResourceKind {
    Pods,
    Services,
    Deployments,
    #[value(name = "statefulsets")]
    StatefulSets,
    Events,
}

/// Static facts about one resource kind
pub struct KindDescriptor {
    pub kind: ResourceKind,
    /// Short label used for tabs and log fields
    pub label: &'static str,
    pub api_resource: fn() -> ApiResource,
    /// One-line status text for a table row
    pub summary: fn(&DynamicObject) -> String,
}

static DESCRIPTORS: [KindDescriptor; 5] = [
    KindDescriptor {
        kind: ResourceKind::Pods,
        label: "pods",
        api_resource: pod_api_resource,
        summary: pod_summary,
    },
    KindDescriptor {
        kind: ResourceKind::Services,
        label: "services",
        api_resource: service_api_resource,
        summary: service_summary,
    },
    KindDescriptor {
        kind: ResourceKind::Deployments,
        label: "deployments",
        api_resource: deployment_api_resource,
        summary: replicas_summary,
    },
    KindDescriptor {
        kind: ResourceKind::StatefulSets,
        label: "statefulsets",
        api_resource: statefulset_api_resource,
        summary: replicas_summary,
    },
    KindDescriptor {
        kind: ResourceKind::Events,
        label: "events",
        api_resource: event_api_resource,
        summary: event_summary,
    },
];

impl ResourceKind {
    pub const ALL: [Self; 5] = [
        Self::Pods,
        Self::Services,
        Self::Deployments,
        Self::StatefulSets,
        Self::Events,
    ];

    #[must_use]
    pub fn descriptor(self) -> &'static KindDescriptor {
        // the table is ordered like the enum
        &DESCRIPTORS[self as usize]
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        self.descriptor().label
    }

    #[must_use]
    pub fn api_resource(self) -> ApiResource {
        (self.descriptor().api_resource)()
    }

    #[must_use]
    pub fn summarize(self, obj: &DynamicObject) -> String {
        (self.descriptor().summary)(obj)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Anything carrying a `resourceVersion`
pub trait HasVersionMarker {
    fn version_marker(&self) -> Option<&str>;
}

/// Anything addressable by `(namespace, name)`
pub trait HasIdentity {
    fn namespace_name(&self) -> (Option<&str>, Option<&str>);

    /// `namespace/name`, or just `name` for cluster-scoped objects
    fn display_name(&self) -> String {
        match self.namespace_name() {
            (Some(ns), Some(name)) => format!("{ns}/{name}"),
            (None, Some(name)) => name.to_string(),
            _ => "<unnamed>".to_string(),
        }
    }
}

impl<K: kube::Resource> HasVersionMarker for K {
    fn version_marker(&self) -> Option<&str> {
        self.meta()
            .resource_version
            .as_deref()
            .filter(|rv| !rv.is_empty())
    }
}

impl<K: kube::Resource> HasIdentity for K {
    fn namespace_name(&self) -> (Option<&str>, Option<&str>) {
        let meta = self.meta();
        (meta.namespace.as_deref(), meta.name.as_deref())
    }
}

fn pod_api_resource() -> ApiResource {
    ApiResource::erase::<Pod>(&())
}

fn service_api_resource() -> ApiResource {
    ApiResource::erase::<Service>(&())
}

fn deployment_api_resource() -> ApiResource {
    ApiResource::erase::<Deployment>(&())
}

fn statefulset_api_resource() -> ApiResource {
    ApiResource::erase::<StatefulSet>(&())
}

fn event_api_resource() -> ApiResource {
    ApiResource::erase::<Event>(&())
}

fn str_at<'a>(obj: &'a DynamicObject, pointer: &str) -> Option<&'a str> {
    obj.data.pointer(pointer).and_then(Value::as_str)
}

fn int_at(obj: &DynamicObject, pointer: &str) -> i64 {
    obj.data.pointer(pointer).and_then(Value::as_i64).unwrap_or(0)
}

fn pod_summary(obj: &DynamicObject) -> String {
    let phase = str_at(obj, "/status/phase").unwrap_or("Unknown");
    let statuses = obj
        .data
        .pointer("/status/containerStatuses")
        .and_then(Value::as_array);
    match statuses {
        Some(statuses) => {
            let ready = statuses
                .iter()
                .filter(|s| s.get("ready").and_then(Value::as_bool).unwrap_or(false))
                .count();
            format!("{phase} {ready}/{}", statuses.len())
        }
        None => phase.to_string(),
    }
}

fn service_summary(obj: &DynamicObject) -> String {
    let type_ = str_at(obj, "/spec/type").unwrap_or("ClusterIP");
    let ip = str_at(obj, "/spec/clusterIP").unwrap_or("-");
    format!("{type_} {ip}")
}

fn replicas_summary(obj: &DynamicObject) -> String {
    let ready = int_at(obj, "/status/readyReplicas");
    let desired = int_at(obj, "/spec/replicas");
    format!("{ready}/{desired} ready")
}

fn event_summary(obj: &DynamicObject) -> String {
    let type_ = str_at(obj, "/type").unwrap_or("Normal");
    let reason = str_at(obj, "/reason").unwrap_or_default();
    let message = str_at(obj, "/message").unwrap_or_default().trim();
    format!("{type_} {reason}: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::serde_json::{self, json};

    fn dyn_obj(value: Value) -> DynamicObject {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_descriptor_table_matches_enum_order() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.descriptor().kind, kind);
        }
    }

    #[test]
    fn test_api_resources_come_from_typed_objects() {
        assert_eq!(ResourceKind::Pods.api_resource().plural, "pods");
        assert_eq!(ResourceKind::Deployments.api_resource().group, "apps");
        assert_eq!(ResourceKind::StatefulSets.api_resource().plural, "statefulsets");
        assert_eq!(ResourceKind::Events.api_resource().kind, "Event");
    }

    #[test]
    fn test_capability_traits_read_metadata() {
        let obj = dyn_obj(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "web-0", "namespace": "shop", "resourceVersion": "42"}
        }));
        assert_eq!(obj.version_marker(), Some("42"));
        assert_eq!(obj.namespace_name(), (Some("shop"), Some("web-0")));
        assert_eq!(obj.display_name(), "shop/web-0");

        let empty = dyn_obj(json!({"apiVersion": "v1", "kind": "Pod", "metadata": {"resourceVersion": ""}}));
        assert_eq!(empty.version_marker(), None);
        assert_eq!(empty.display_name(), "<unnamed>");
    }

    #[test]
    fn test_summaries() {
        let pod = dyn_obj(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "p"},
            "status": {"phase": "Running", "containerStatuses": [{"ready": true}, {"ready": false}]}
        }));
        assert_eq!(ResourceKind::Pods.summarize(&pod), "Running 1/2");

        let deploy = dyn_obj(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "d"},
            "spec": {"replicas": 3},
            "status": {"readyReplicas": 2}
        }));
        assert_eq!(ResourceKind::Deployments.summarize(&deploy), "2/3 ready");

        let event = dyn_obj(json!({
            "apiVersion": "v1",
            "kind": "Event",
            "metadata": {"name": "e"},
            "type": "Warning",
            "reason": "BackOff",
            "message": " restarting failed container "
        }));
        assert_eq!(
            ResourceKind::Events.summarize(&event),
            "Warning BackOff: restarting failed container"
        );
    }
}
