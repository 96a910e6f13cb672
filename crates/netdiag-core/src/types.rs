use crate::constants::*;
use k8s_openapi::api::core::v1::Pod;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Which set of probe pods a check runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeGroup {
    /// Pod-network probes used for CNI connectivity and DNS
    Basic,
    /// Host-network probes used for bandwidth measurement
    HostNetwork,
}

impl ProbeGroup {
    pub fn all() -> [ProbeGroup; 2] {
        [ProbeGroup::Basic, ProbeGroup::HostNetwork]
    }

    /// DaemonSet name for this group
    pub fn workload_name(&self) -> &'static str {
        match self {
            ProbeGroup::Basic => BASIC_CHECKER_DS_NAME,
            ProbeGroup::HostNetwork => HOST_NETWORK_CHECKER_DS_NAME,
        }
    }

    /// Value of the `app` selector label
    pub fn label(&self) -> &'static str {
        match self {
            ProbeGroup::Basic => BASIC_CHECKER_LABEL,
            ProbeGroup::HostNetwork => HOST_NETWORK_CHECKER_LABEL,
        }
    }

    pub fn host_network(&self) -> bool {
        matches!(self, ProbeGroup::HostNetwork)
    }

    /// Selector labels unique to this group
    pub fn selector(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(APP_LABEL_KEY.to_string(), self.label().to_string())])
    }

    /// Selector rendered the way the API expects in `labelSelector`
    pub fn selector_string(&self) -> String {
        format!("{}={}", APP_LABEL_KEY, self.label())
    }
}

impl fmt::Display for ProbeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeGroup::Basic => write!(f, "basic"),
            ProbeGroup::HostNetwork => write!(f, "hostnetwork"),
        }
    }
}

/// One running probe pod
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInstance {
    pub name: String,
    pub node: Option<String>,
    /// Cluster-reported pod IP, absent until the pod is assigned one
    pub ip: Option<IpAddr>,
    pub group: ProbeGroup,
}

impl ProbeInstance {
    pub fn new(name: impl Into<String>, node: impl Into<String>, ip: IpAddr, group: ProbeGroup) -> Self {
        Self {
            name: name.into(),
            node: Some(node.into()),
            ip: Some(ip),
            group,
        }
    }

    /// Build an instance from a listed pod. Pods without a name are skipped.
    pub fn from_pod(pod: &Pod, group: ProbeGroup) -> Option<Self> {
        let name = pod.metadata.name.clone()?;
        let node = pod.spec.as_ref().and_then(|s| s.node_name.clone());
        let ip = pod
            .status
            .as_ref()
            .and_then(|s| s.pod_ip.as_deref())
            .and_then(|ip| ip.parse().ok());

        Some(Self {
            name,
            node,
            ip,
            group,
        })
    }
}

impl fmt::Display for ProbeInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            Some(node) => write!(f, "{} (node {})", self.name, node),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Position of an unordered pair in discovery order; `source < destination`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairIndex {
    pub source: usize,
    pub destination: usize,
}

/// One pairwise bandwidth measurement
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub pair: PairIndex,
    pub source_ip: String,
    pub destination_ip: String,
    /// Sender-side throughput in MB/s
    pub bandwidth_mb: f64,
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: {:.2} MB/s",
            self.source_ip, self.destination_ip, self.bandwidth_mb
        )
    }
}
