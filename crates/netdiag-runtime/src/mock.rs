use crate::traits::{ClusterApi, RemoteRunner, StatusReporter, StepOutcome};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::DaemonSetStatus;
use k8s_openapi::api::core::v1::{PodSpec, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use netdiag_core::{DaemonSet, Namespace, NetdiagError, Pod, Result, Service};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::Mutex;
use tokio::sync::RwLock;
use tracing::debug;

/// What a scripted `get_daemon_set` call returns
#[derive(Debug, Clone)]
pub enum MockFetch {
    Status { available: i32, unavailable: i32 },
    Missing,
    Error,
    /// The call never completes, like an API server that stops answering
    Hang,
}

#[derive(Default)]
struct ClusterState {
    namespaces: BTreeMap<String, Namespace>,
    daemon_sets: BTreeMap<(String, String), DaemonSet>,
    services: BTreeMap<(String, String), Service>,
    pods: Vec<Pod>,
    fetch_scripts: HashMap<String, VecDeque<MockFetch>>,
    unseen_namespaces: HashSet<String>,
    fail_namespace_delete: bool,
    calls: Vec<String>,
}

/// In-memory cluster for tests
///
/// Creating a DaemonSet schedules one pod per configured node and reports
/// the DaemonSet fully available, which is what a healthy controller would
/// converge to. Host-network pods get the node address, others get a pod
/// address in 10.244.<node-index>.10. Readiness can be overridden per
/// DaemonSet with `script_daemon_set`.
pub struct MockCluster {
    nodes: Vec<(String, IpAddr)>,
    state: RwLock<ClusterState>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::with_nodes(&[])
    }

    pub fn with_nodes(nodes: &[(&str, &str)]) -> Self {
        let nodes = nodes
            .iter()
            .filter_map(|(name, ip)| Some((name.to_string(), ip.parse().ok()?)))
            .collect();
        Self {
            nodes,
            state: RwLock::new(ClusterState::default()),
        }
    }

    /// Queue responses for `get_daemon_set(name)`; the last entry repeats
    pub async fn script_daemon_set(&self, name: &str, fetches: Vec<MockFetch>) {
        let mut state = self.state.write().await;
        state
            .fetch_scripts
            .insert(name.to_string(), fetches.into_iter().collect());
    }

    /// Store a DaemonSet as-is, without scheduling pods
    pub async fn insert_daemon_set(&self, daemon_set: DaemonSet) {
        let key = (
            daemon_set.metadata.namespace.clone().unwrap_or_default(),
            daemon_set.metadata.name.clone().unwrap_or_default(),
        );
        self.state.write().await.daemon_sets.insert(key, daemon_set);
    }

    /// Namespace left behind by an earlier netdiag run
    pub async fn insert_namespace(&self, name: &str) {
        self.state
            .write()
            .await
            .namespaces
            .insert(name.to_string(), netdiag_core::resources::new_namespace(name));
    }

    /// Namespace owned by someone else, with no netdiag labels
    pub async fn insert_foreign_namespace(&self, name: &str) {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        self.state
            .write()
            .await
            .namespaces
            .insert(name.to_string(), namespace);
    }

    /// Another client creates `name` between our read and our create:
    /// `get_namespace` reports it absent once, then `create_namespace` conflicts
    pub async fn create_namespace_concurrently(&self, name: &str) {
        self.insert_namespace(name).await;
        self.state
            .write()
            .await
            .unseen_namespaces
            .insert(name.to_string());
    }

    pub async fn insert_pod(&self, pod: Pod) {
        self.state.write().await.pods.push(pod);
    }

    pub async fn fail_namespace_delete(&self) {
        self.state.write().await.fail_namespace_delete = true;
    }

    pub async fn has_namespace(&self, name: &str) -> bool {
        self.state.read().await.namespaces.contains_key(name)
    }

    pub async fn daemon_set(&self, namespace: &str, name: &str) -> Option<DaemonSet> {
        self.state
            .read()
            .await
            .daemon_sets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub async fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.state
            .read()
            .await
            .services
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Every call made so far, e.g. `create_daemon_set netdiag/basic-checker`
    pub async fn calls(&self) -> Vec<String> {
        self.state.read().await.calls.clone()
    }

    /// Only the calls that change cluster state
    pub async fn mutations(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter(|c| c.starts_with("create_") || c.starts_with("delete_"))
            .collect()
    }

    fn schedule_pods(&self, namespace: &str, daemon_set: &DaemonSet) -> (Vec<Pod>, DaemonSetStatus) {
        let name = daemon_set.metadata.name.clone().unwrap_or_default();
        let template = daemon_set.spec.as_ref().map(|s| &s.template);
        let labels = template
            .and_then(|t| t.metadata.as_ref())
            .and_then(|m| m.labels.clone());
        let host_network = template
            .and_then(|t| t.spec.as_ref())
            .and_then(|s| s.host_network)
            .unwrap_or(false);

        let pods = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, (node, node_ip))| {
                let pod_ip = if host_network {
                    node_ip.to_string()
                } else {
                    format!("10.244.{}.10", i)
                };
                Pod {
                    metadata: ObjectMeta {
                        name: Some(format!("{}-{}", name, i)),
                        namespace: Some(namespace.to_string()),
                        labels: labels.clone(),
                        ..Default::default()
                    },
                    spec: Some(PodSpec {
                        node_name: Some(node.clone()),
                        host_network: host_network.then_some(true),
                        ..Default::default()
                    }),
                    status: Some(PodStatus {
                        phase: Some("Running".to_string()),
                        pod_ip: Some(pod_ip),
                        ..Default::default()
                    }),
                }
            })
            .collect();

        let count = self.nodes.len() as i32;
        let status = DaemonSetStatus {
            desired_number_scheduled: count,
            current_number_scheduled: count,
            number_ready: count,
            number_available: Some(count),
            number_unavailable: Some(0),
            ..Default::default()
        };

        (pods, status)
    }
}

impl Default for MockCluster {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_selector(pod: &Pod, label_selector: &str) -> bool {
    let labels = match &pod.metadata.labels {
        Some(l) => l,
        None => return label_selector.is_empty(),
    };
    label_selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key).map(String::as_str) == Some(value),
            None => labels.contains_key(term),
        })
}

#[async_trait]
impl ClusterApi for MockCluster {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>> {
        let mut state = self.state.write().await;
        state.calls.push(format!("get_namespace {}", name));
        if state.unseen_namespaces.remove(name) {
            return Ok(None);
        }
        Ok(state.namespaces.get(name).cloned())
    }

    async fn create_namespace(&self, namespace: &Namespace) -> Result<()> {
        let name = namespace.metadata.name.clone().unwrap_or_default();
        let mut state = self.state.write().await;
        state.calls.push(format!("create_namespace {}", name));
        if state.namespaces.contains_key(&name) {
            return Err(NetdiagError::already_exists(format!("namespaces/{}", name)));
        }
        state.namespaces.insert(name, namespace.clone());
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.calls.push(format!("delete_namespace {}", name));
        if state.fail_namespace_delete {
            return Err(NetdiagError::cluster_api(format!(
                "DELETE /api/v1/namespaces/{} failed with status 403 Forbidden",
                name
            )));
        }
        state.namespaces.remove(name);
        state.daemon_sets.retain(|(ns, _), _| ns != name);
        state.services.retain(|(ns, _), _| ns != name);
        state
            .pods
            .retain(|p| p.metadata.namespace.as_deref() != Some(name));
        debug!("Mock: namespace deleted: {}", name);
        Ok(())
    }

    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<Option<DaemonSet>> {
        let mut state = self.state.write().await;
        state.calls.push(format!("get_daemon_set {}/{}", namespace, name));

        let stored = state
            .daemon_sets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned();

        let scripted = match state.fetch_scripts.get_mut(name) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        drop(state);

        match scripted {
            None => Ok(stored),
            Some(MockFetch::Hang) => std::future::pending().await,
            Some(MockFetch::Missing) => Ok(None),
            Some(MockFetch::Error) => Err(NetdiagError::cluster_api(format!(
                "GET daemonset {}/{} failed with status 500",
                namespace, name
            ))),
            Some(MockFetch::Status {
                available,
                unavailable,
            }) => {
                let mut ds =
                    stored.unwrap_or_else(|| netdiag_core::resources::new_daemon_set(namespace, name));
                ds.status = Some(DaemonSetStatus {
                    number_available: Some(available),
                    number_unavailable: Some(unavailable),
                    ..Default::default()
                });
                Ok(Some(ds))
            }
        }
    }

    async fn create_daemon_set(&self, namespace: &str, daemon_set: &DaemonSet) -> Result<()> {
        let name = daemon_set.metadata.name.clone().unwrap_or_default();
        let (pods, status) = self.schedule_pods(namespace, daemon_set);

        let mut state = self.state.write().await;
        state
            .calls
            .push(format!("create_daemon_set {}/{}", namespace, name));

        let key = (namespace.to_string(), name.clone());
        if state.daemon_sets.contains_key(&key) {
            return Err(NetdiagError::already_exists(format!(
                "{}/daemonsets/{}",
                namespace, name
            )));
        }

        let mut stored = daemon_set.clone();
        if !self.nodes.is_empty() {
            stored.status = Some(status);
        }
        state.daemon_sets.insert(key, stored);
        state.pods.extend(pods);
        debug!("Mock: daemonset created: {}/{}", namespace, name);
        Ok(())
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<()> {
        let name = service.metadata.name.clone().unwrap_or_default();
        let mut state = self.state.write().await;
        state
            .calls
            .push(format!("create_service {}/{}", namespace, name));

        let key = (namespace.to_string(), name.clone());
        if state.services.contains_key(&key) {
            return Err(NetdiagError::already_exists(format!(
                "{}/services/{}",
                namespace, name
            )));
        }
        state.services.insert(key, service.clone());
        Ok(())
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>> {
        let mut state = self.state.write().await;
        state
            .calls
            .push(format!("list_pods {} {}", namespace, label_selector));
        Ok(state
            .pods
            .iter()
            .filter(|p| p.metadata.namespace.as_deref() == Some(namespace))
            .filter(|p| matches_selector(p, label_selector))
            .cloned()
            .collect())
    }
}

struct ExecRule {
    pod: String,
    contains: String,
    response: std::result::Result<String, String>,
}

/// Scripted `RemoteRunner`
///
/// Rules are matched in registration order on pod name (`*` matches any pod)
/// and a substring of the command line. Unmatched commands succeed with
/// empty output.
#[derive(Default)]
pub struct MockRunner {
    rules: RwLock<Vec<ExecRule>>,
    calls: RwLock<Vec<(String, String)>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn respond(&self, pod: &str, contains: &str, stdout: &str) {
        self.rules.write().await.push(ExecRule {
            pod: pod.to_string(),
            contains: contains.to_string(),
            response: Ok(stdout.to_string()),
        });
    }

    pub async fn fail(&self, pod: &str, contains: &str, cause: &str) {
        self.rules.write().await.push(ExecRule {
            pod: pod.to_string(),
            contains: contains.to_string(),
            response: Err(cause.to_string()),
        });
    }

    /// `(pod, command_line)` for every call, in call order
    pub async fn calls(&self) -> Vec<(String, String)> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl RemoteRunner for MockRunner {
    async fn run_command(
        &self,
        pod_name: &str,
        _namespace: &str,
        command_line: &str,
    ) -> Result<String> {
        self.calls
            .write()
            .await
            .push((pod_name.to_string(), command_line.to_string()));

        let rules = self.rules.read().await;
        let rule = rules.iter().find(|r| {
            (r.pod == "*" || r.pod == pod_name) && command_line.contains(r.contains.as_str())
        });

        match rule.map(|r| &r.response) {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(cause)) => Err(NetdiagError::execution(pod_name, cause.clone())),
            None => Ok(String::new()),
        }
    }
}

/// `StatusReporter` that remembers every transition
#[derive(Default)]
pub struct RecordingStatus {
    events: Mutex<Vec<(String, Option<StepOutcome>)>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(step, None)` for a start, `(step, Some(outcome))` for a stop
    pub fn events(&self) -> Vec<(String, Option<StepOutcome>)> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl StatusReporter for RecordingStatus {
    fn start(&self, step: &str) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((step.to_string(), None));
    }

    fn stop(&self, step: &str, outcome: StepOutcome) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((step.to_string(), Some(outcome)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netdiag_core::resources::probe_daemon_set;
    use netdiag_core::ProbeGroup;

    fn three_nodes() -> MockCluster {
        MockCluster::with_nodes(&[
            ("node-a", "192.168.1.11"),
            ("node-b", "192.168.1.12"),
            ("node-c", "192.168.1.13"),
        ])
    }

    #[tokio::test]
    async fn test_create_daemon_set_schedules_one_pod_per_node() {
        let cluster = three_nodes();
        let ds = probe_daemon_set("netdiag", ProbeGroup::HostNetwork, "img", "", &BTreeMap::new());
        cluster.create_daemon_set("netdiag", &ds).await.unwrap();

        let pods = cluster
            .list_pods("netdiag", "app=netdiag-hostnetwork")
            .await
            .unwrap();
        assert_eq!(pods.len(), 3);
        assert_eq!(
            pods[1].status.as_ref().unwrap().pod_ip.as_deref(),
            Some("192.168.1.12")
        );

        let stored = cluster
            .get_daemon_set("netdiag", "hostnetwork-checker")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status.unwrap().number_available, Some(3));
    }

    #[tokio::test]
    async fn test_selector_filters_groups() {
        let cluster = three_nodes();
        for group in ProbeGroup::all() {
            let ds = probe_daemon_set("netdiag", group, "img", "", &BTreeMap::new());
            cluster.create_daemon_set("netdiag", &ds).await.unwrap();
        }

        let basic = cluster.list_pods("netdiag", "app=netdiag-basic").await.unwrap();
        assert_eq!(basic.len(), 3);
        assert_eq!(
            basic[0].status.as_ref().unwrap().pod_ip.as_deref(),
            Some("10.244.0.10")
        );
    }

    #[tokio::test]
    async fn test_duplicate_create_returns_already_exists() {
        let cluster = MockCluster::new();
        let ns = netdiag_core::resources::new_namespace("netdiag");
        cluster.create_namespace(&ns).await.unwrap();
        assert!(cluster.create_namespace(&ns).await.unwrap_err().is_already_exists());
    }

    #[tokio::test]
    async fn test_delete_namespace_removes_contents() {
        let cluster = three_nodes();
        cluster.insert_namespace("netdiag").await;
        let ds = probe_daemon_set("netdiag", ProbeGroup::Basic, "img", "", &BTreeMap::new());
        cluster.create_daemon_set("netdiag", &ds).await.unwrap();

        cluster.delete_namespace("netdiag").await.unwrap();
        assert!(!cluster.has_namespace("netdiag").await);
        assert!(cluster.list_pods("netdiag", "").await.unwrap().is_empty());
        assert!(cluster.daemon_set("netdiag", "basic-checker").await.is_none());
    }

    #[tokio::test]
    async fn test_scripted_fetches_repeat_last() {
        let cluster = MockCluster::new();
        cluster
            .script_daemon_set(
                "basic-checker",
                vec![
                    MockFetch::Error,
                    MockFetch::Status {
                        available: 2,
                        unavailable: 0,
                    },
                ],
            )
            .await;

        assert!(cluster.get_daemon_set("netdiag", "basic-checker").await.is_err());
        for _ in 0..2 {
            let ds = cluster
                .get_daemon_set("netdiag", "basic-checker")
                .await
                .unwrap()
                .unwrap();
            assert_eq!(ds.status.unwrap().number_available, Some(2));
        }
    }

    #[tokio::test]
    async fn test_runner_rules() {
        let runner = MockRunner::new();
        runner.respond("pod-a", "cat", "10.0.0.1\n").await;
        runner.fail("*", "nc -zv", "connection refused").await;

        assert_eq!(
            runner.run_command("pod-a", "ns", "cat /opt/x").await.unwrap(),
            "10.0.0.1\n"
        );
        assert!(runner.run_command("pod-b", "ns", "cat /opt/x").await.unwrap().is_empty());
        assert!(matches!(
            runner.run_command("pod-b", "ns", "nc -zv 1.2.3.4 5201").await,
            Err(NetdiagError::Execution { .. })
        ));
        assert_eq!(runner.calls().await.len(), 3);
    }
}
