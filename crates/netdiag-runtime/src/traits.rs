use async_trait::async_trait;
use netdiag_core::{DaemonSet, Namespace, Pod, Result, Service};

/// Cluster resource operations a diagnostic run needs
///
/// `get_*` return `Ok(None)` when the object does not exist, `create_*`
/// fail with `NetdiagError::AlreadyExists` on conflict. `ApiClient` talks to
/// a real API server; `MockCluster` keeps everything in memory for tests.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>>;

    async fn create_namespace(&self, namespace: &Namespace) -> Result<()>;

    /// Delete a namespace. Deleting a missing namespace succeeds.
    async fn delete_namespace(&self, name: &str) -> Result<()>;

    async fn get_daemon_set(&self, namespace: &str, name: &str) -> Result<Option<DaemonSet>>;

    async fn create_daemon_set(&self, namespace: &str, daemon_set: &DaemonSet) -> Result<()>;

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<()>;

    /// List pods matching a `key=value` label selector, in API order
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>>;
}

/// Runs a shell command line inside a probe pod
///
/// Non-zero exit and transport failure both surface as
/// `NetdiagError::Execution`. Implementations never retry.
#[async_trait]
pub trait RemoteRunner: Send + Sync {
    async fn run_command(&self, pod_name: &str, namespace: &str, command_line: &str)
        -> Result<String>;
}

/// Final state of a reported step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    Failure,
}

/// Progress indicator for long-running steps
pub trait StatusReporter: Send + Sync {
    fn start(&self, step: &str);

    fn stop(&self, step: &str, outcome: StepOutcome);
}
