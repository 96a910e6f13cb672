use crate::poller::is_daemon_set_ready;
use crate::traits::ClusterApi;
use netdiag_core::constants::RUN_ID_LABEL_KEY;
use netdiag_core::resources::{is_managed_namespace, new_namespace, probe_daemon_set};
use netdiag_core::{parse_cidr, DaemonSet, NetdiagError, ProbeGroup, Result};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What `deploy` found or did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Workload was submitted by this call
    Created,
    /// Workload already existed but is not ready yet
    Existing,
    /// Workload already existed and is ready; nothing was submitted
    AlreadyReady,
}

impl DeployOutcome {
    pub fn needs_wait(&self) -> bool {
        !matches!(self, DeployOutcome::AlreadyReady)
    }
}

/// Result of deploying one probe group
#[derive(Debug, Clone)]
pub struct Deployment {
    pub workload: DaemonSet,
    pub outcome: DeployOutcome,
}

/// DaemonSet a probe group should run as.
///
/// The data range is validated for every group but injected only into the
/// host-network one. No cluster access.
pub fn desired_workload(
    namespace: &str,
    image: &str,
    group: ProbeGroup,
    data_cidr: &str,
    run_id: Option<&str>,
) -> Result<DaemonSet> {
    parse_cidr(data_cidr)?;
    let injected = if group.host_network() {
        data_cidr.trim()
    } else {
        ""
    };

    let mut extra_labels = BTreeMap::new();
    if let Some(run_id) = run_id {
        extra_labels.insert(RUN_ID_LABEL_KEY.to_string(), run_id.to_string());
    }

    Ok(probe_daemon_set(namespace, group, image, injected, &extra_labels))
}

/// Builds and submits probe DaemonSets
pub struct WorkloadDeployer<'a> {
    cluster: &'a dyn ClusterApi,
    namespace: String,
    image: String,
    run_id: Option<String>,
}

impl<'a> WorkloadDeployer<'a> {
    pub fn new(cluster: &'a dyn ClusterApi, namespace: &str, image: &str) -> Self {
        Self {
            cluster,
            namespace: namespace.to_string(),
            image: image.to_string(),
            run_id: None,
        }
    }

    /// Label created pods with the id of the run that created them
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Desired DaemonSet for `group`, validating `data_cidr` first
    pub fn build_workload(&self, group: ProbeGroup, data_cidr: &str) -> Result<DaemonSet> {
        desired_workload(
            &self.namespace,
            &self.image,
            group,
            data_cidr,
            self.run_id.as_deref(),
        )
    }

    /// Ensure the namespace and the group's DaemonSet exist.
    ///
    /// Nothing touches the cluster when `data_cidr` is invalid.
    pub async fn deploy(&self, group: ProbeGroup, data_cidr: &str) -> Result<Deployment> {
        let desired = self.build_workload(group, data_cidr)?;

        self.ensure_namespace().await?;

        let name = group.workload_name();
        if let Some(existing) = self.cluster.get_daemon_set(&self.namespace, name).await? {
            let outcome = if is_daemon_set_ready(&existing) {
                info!("DaemonSet {}/{} already ready, skipping deploy", self.namespace, name);
                DeployOutcome::AlreadyReady
            } else {
                debug!("DaemonSet {}/{} exists but is not ready", self.namespace, name);
                DeployOutcome::Existing
            };
            return Ok(Deployment {
                workload: existing,
                outcome,
            });
        }

        match self.cluster.create_daemon_set(&self.namespace, &desired).await {
            Ok(()) => {
                info!("Created DaemonSet {}/{}", self.namespace, name);
                Ok(Deployment {
                    workload: desired,
                    outcome: DeployOutcome::Created,
                })
            }
            Err(e) if e.is_already_exists() => {
                debug!("DaemonSet {}/{} appeared concurrently", self.namespace, name);
                Ok(Deployment {
                    workload: desired,
                    outcome: DeployOutcome::Existing,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Create the namespace, or reuse one an earlier run left behind.
    ///
    /// A namespace without the netdiag managed-by label belongs to someone
    /// else and is never used, since cleanup would delete it.
    async fn ensure_namespace(&self) -> Result<()> {
        if let Some(existing) = self.cluster.get_namespace(&self.namespace).await? {
            if !is_managed_namespace(&existing) {
                return Err(NetdiagError::configuration(
                    format!("namespace {} exists and is not managed by netdiag", self.namespace),
                    "pass --namespace with a name that does not exist yet",
                ));
            }
            debug!("Reusing namespace {}", self.namespace);
            return Ok(());
        }

        let mut namespace = new_namespace(&self.namespace);
        if let (Some(run_id), Some(labels)) = (&self.run_id, namespace.metadata.labels.as_mut()) {
            labels.insert(RUN_ID_LABEL_KEY.to_string(), run_id.clone());
        }

        match self.cluster.create_namespace(&namespace).await {
            Ok(()) => {
                info!("Created namespace {}", self.namespace);
                Ok(())
            }
            Err(e) if e.is_already_exists() => Ok(()),
            Err(e) => Err(e),
        }
    }
}
