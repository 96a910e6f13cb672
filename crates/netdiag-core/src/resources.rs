use crate::constants::{
    APP_LABEL_KEY, DATA_CIDR_CONTAINER_ENV, MANAGED_BY_LABEL_KEY, MANAGED_BY_VALUE, PROBE_PORT,
};
use crate::types::ProbeGroup;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, Namespace, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use std::collections::BTreeMap;

/// Object metadata for a namespaced resource
pub fn object_meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        namespace: Some(namespace.to_string()),
        name: Some(name.to_string()),
        ..Default::default()
    }
}

/// Namespace labelled as managed by netdiag
pub fn new_namespace(name: &str) -> Namespace {
    let labels = BTreeMap::from([(
        MANAGED_BY_LABEL_KEY.to_string(),
        MANAGED_BY_VALUE.to_string(),
    )]);
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Whether netdiag created this namespace and may delete it
pub fn is_managed_namespace(namespace: &Namespace) -> bool {
    namespace
        .metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(MANAGED_BY_LABEL_KEY))
        .is_some_and(|v| v == MANAGED_BY_VALUE)
}

pub fn new_daemon_set(namespace: &str, name: &str) -> DaemonSet {
    DaemonSet {
        metadata: object_meta(namespace, name),
        ..Default::default()
    }
}

pub fn new_service(namespace: &str, name: &str) -> Service {
    Service {
        metadata: object_meta(namespace, name),
        ..Default::default()
    }
}

/// Desired probe DaemonSet for a group.
///
/// `data_cidr` is injected as `DATA_CIDR`; callers pass an empty string for
/// groups that do not bind to the data network.
pub fn probe_daemon_set(
    namespace: &str,
    group: ProbeGroup,
    image: &str,
    data_cidr: &str,
    extra_labels: &BTreeMap<String, String>,
) -> DaemonSet {
    let selector = group.selector();
    let mut pod_labels = selector.clone();
    pod_labels.extend(extra_labels.clone());

    let mut ds = new_daemon_set(namespace, group.workload_name());
    ds.metadata.labels = Some(pod_labels.clone());

    let container = Container {
        name: group.label().to_string(),
        image: Some(image.to_string()),
        env: Some(vec![EnvVar {
            name: DATA_CIDR_CONTAINER_ENV.to_string(),
            value: Some(data_cidr.to_string()),
            ..Default::default()
        }]),
        ..Default::default()
    };

    ds.spec = Some(DaemonSetSpec {
        selector: LabelSelector {
            match_labels: Some(selector),
            ..Default::default()
        },
        template: PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(pod_labels),
                ..Default::default()
            }),
            spec: Some(PodSpec {
                host_network: group.host_network().then_some(true),
                containers: vec![container],
                ..Default::default()
            }),
        },
        ..Default::default()
    });

    ds
}

/// Service in front of the basic probe pods, resolved by the DNS check
pub fn probe_service(namespace: &str, name: &str) -> Service {
    let mut service = new_service(namespace, name);
    service.spec = Some(ServiceSpec {
        selector: Some(BTreeMap::from([(
            APP_LABEL_KEY.to_string(),
            ProbeGroup::Basic.label().to_string(),
        )])),
        ports: Some(vec![ServicePort {
            port: PROBE_PORT as i32,
            ..Default::default()
        }]),
        ..Default::default()
    });
    service
}
