use crate::traits::ClusterApi;
use netdiag_core::{ProbeGroup, ProbeInstance, Result};
use tracing::{debug, warn};

/// List the running instances of a probe group, in API order
pub async fn list_instances(
    cluster: &dyn ClusterApi,
    namespace: &str,
    group: ProbeGroup,
) -> Result<Vec<ProbeInstance>> {
    let pods = cluster.list_pods(namespace, &group.selector_string()).await?;

    let mut instances = Vec::with_capacity(pods.len());
    for pod in &pods {
        match ProbeInstance::from_pod(pod, group) {
            Some(instance) => instances.push(instance),
            None => warn!("Skipping unnamed pod in {} group", group),
        }
    }

    debug!("Found {} {} instance(s) in {}", instances.len(), group, namespace);
    Ok(instances)
}
