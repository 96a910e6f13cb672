use crate::discovery::list_instances;
use crate::orchestrator::require_pair;
use crate::traits::{ClusterApi, RemoteRunner};
use netdiag_core::constants::DNS_PROBE_SERVICE_NAME;
use netdiag_core::resources::probe_service;
use netdiag_core::{ProbeGroup, Result};
use tracing::{debug, info};

pub(crate) const DNS_HINT: &str = "DNS service not working";

/// Resolves a Service name from inside a basic probe pod
pub struct DnsChecker<'a> {
    cluster: &'a dyn ClusterApi,
    runner: &'a dyn RemoteRunner,
    namespace: String,
}

impl<'a> DnsChecker<'a> {
    pub fn new(cluster: &'a dyn ClusterApi, runner: &'a dyn RemoteRunner, namespace: &str) -> Self {
        Self {
            cluster,
            runner,
            namespace: namespace.to_string(),
        }
    }

    /// Create the probe Service and look it up by name from the first basic instance
    pub async fn check(&self) -> Result<()> {
        let service = probe_service(&self.namespace, DNS_PROBE_SERVICE_NAME);
        match self.cluster.create_service(&self.namespace, &service).await {
            Ok(()) => info!("Created Service {}/{}", self.namespace, DNS_PROBE_SERVICE_NAME),
            Err(e) if e.is_already_exists() => {
                debug!("Service {}/{} already exists", self.namespace, DNS_PROBE_SERVICE_NAME)
            }
            Err(e) => return Err(e),
        }

        let instances = list_instances(self.cluster, &self.namespace, ProbeGroup::Basic).await?;
        require_pair(&instances)?;

        let client = &instances[0];
        let output = self
            .runner
            .run_command(
                &client.name,
                &self.namespace,
                &format!("host {}", DNS_PROBE_SERVICE_NAME),
            )
            .await
            .map_err(|e| e.with_hint(DNS_HINT))?;

        debug!("{} resolved {}: {}", client.name, DNS_PROBE_SERVICE_NAME, output.trim());
        Ok(())
    }
}
