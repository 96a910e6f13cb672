use crate::traits::ClusterApi;
use netdiag_core::{DaemonSet, NetdiagError, Result};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Whether a DaemonSet reports no unavailable and at least one available pod
pub fn is_daemon_set_ready(daemon_set: &DaemonSet) -> bool {
    match &daemon_set.status {
        Some(status) => {
            status.number_unavailable.unwrap_or(0) == 0 && status.number_available.unwrap_or(0) > 0
        }
        None => false,
    }
}

/// Blocks until a DaemonSet becomes ready
pub struct ReadinessPoller<'a> {
    cluster: &'a dyn ClusterApi,
    interval: Duration,
    timeout: Duration,
}

impl<'a> ReadinessPoller<'a> {
    pub fn new(cluster: &'a dyn ClusterApi, interval: Duration, timeout: Duration) -> Self {
        Self {
            cluster,
            interval,
            timeout,
        }
    }

    /// Poll until `namespace/name` is ready or the timeout elapses.
    ///
    /// The first check happens immediately and a last one at the deadline.
    /// Fetch errors, a missing object and a fetch still outstanding at the
    /// deadline count as still pending.
    pub async fn wait_ready(&self, namespace: &str, name: &str) -> Result<DaemonSet> {
        let deadline = Instant::now() + self.timeout;
        let mut ticks = 0u32;

        loop {
            ticks += 1;
            let budget = deadline.saturating_duration_since(Instant::now());
            let fetched =
                tokio::time::timeout(budget, self.cluster.get_daemon_set(namespace, name)).await;
            let fetched = match fetched {
                Ok(result) => result,
                Err(_) => {
                    debug!("Fetching DaemonSet {}/{} did not answer in time", namespace, name);
                    Ok(None)
                }
            };

            match fetched {
                Ok(Some(ds)) if is_daemon_set_ready(&ds) => {
                    info!("DaemonSet {}/{} ready after {} check(s)", namespace, name, ticks);
                    return Ok(ds);
                }
                Ok(Some(ds)) => {
                    let (available, unavailable) = ds
                        .status
                        .as_ref()
                        .map(|s| (s.number_available.unwrap_or(0), s.number_unavailable.unwrap_or(0)))
                        .unwrap_or((0, 0));
                    debug!(
                        "DaemonSet {}/{} pending: {} available, {} unavailable",
                        namespace, name, available, unavailable
                    );
                }
                Ok(None) => debug!("DaemonSet {}/{} not found yet", namespace, name),
                Err(e) => debug!("Fetching DaemonSet {}/{} failed, retrying: {}", namespace, name, e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(NetdiagError::timeout(
                    format!("daemonset {}", name),
                    namespace,
                    self.timeout.as_secs(),
                ));
            }
            tokio::time::sleep(self.interval.min(deadline - now)).await;
        }
    }
}
