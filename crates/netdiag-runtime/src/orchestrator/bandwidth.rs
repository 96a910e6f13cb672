use super::iperf::{client_command, parse_sender_throughput};
use super::{require_pair, unordered_pairs, unreachable, PairwiseOrchestrator, HOST_NETWORK_HINT};
use crate::config::{ParsePolicy, ProbeSettings};
use crate::traits::RemoteRunner;
use netdiag_core::{CheckResult, NetdiagError, PairIndex, ProbeInstance, Result};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of a pairwise bandwidth scan
///
/// `results` holds every pair measured before the scan stopped, sorted by
/// pair index. `failure` is set when the scan aborted.
#[derive(Debug, Default)]
pub struct PairwiseScan {
    pub results: Vec<CheckResult>,
    pub failure: Option<NetdiagError>,
}

impl PairwiseScan {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn into_result(self) -> Result<Vec<CheckResult>> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(self.results),
        }
    }
}

impl PairwiseOrchestrator {
    /// Measure throughput for every unordered pair of host-network instances.
    ///
    /// The lower-indexed instance is the iperf3 client. The first failing pair
    /// aborts the scan. Only the topology precondition is returned as `Err`;
    /// probe failures end up in `PairwiseScan::failure`.
    pub async fn measure_bandwidth(&self, instances: &[ProbeInstance]) -> Result<PairwiseScan> {
        require_pair(instances)?;

        let pairs = unordered_pairs(instances.len());
        info!(
            "Measuring bandwidth across {} pair(s) of {} instance(s)",
            pairs.len(),
            instances.len()
        );

        let scan = if self.settings.concurrency <= 1 {
            self.scan_sequential(instances, &pairs).await
        } else {
            self.scan_parallel(instances, &pairs).await
        };

        if let Some(e) = &scan.failure {
            warn!(
                "Bandwidth scan aborted after {} of {} pair(s): {}",
                scan.results.len(),
                pairs.len(),
                e
            );
        }
        Ok(scan)
    }

    async fn scan_sequential(&self, instances: &[ProbeInstance], pairs: &[PairIndex]) -> PairwiseScan {
        let mut scan = PairwiseScan::default();
        for &pair in pairs {
            let measured = measure_pair(
                self.runner.as_ref(),
                &self.namespace,
                &self.settings,
                pair,
                &instances[pair.source],
                &instances[pair.destination],
            )
            .await;

            match measured {
                Ok(result) => scan.results.push(result),
                Err(e) => {
                    scan.failure = Some(e);
                    break;
                }
            }
        }
        scan
    }

    /// Run pairs on a bounded worker set. The first failure cancels the
    /// remaining work; the reported failure is the lowest failing pair.
    async fn scan_parallel(&self, instances: &[ProbeInstance], pairs: &[PairIndex]) -> PairwiseScan {
        let token = CancellationToken::new();
        let permits = Arc::new(Semaphore::new(self.settings.concurrency));
        let mut tasks = JoinSet::new();

        for &pair in pairs {
            let runner = self.runner.clone();
            let namespace = self.namespace.clone();
            let settings = self.settings.clone();
            let source = instances[pair.source].clone();
            let destination = instances[pair.destination].clone();
            let permits = permits.clone();
            let token = token.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    _ = token.cancelled() => return (pair, None),
                    permit = permits.acquire_owned() => match permit {
                        Ok(p) => p,
                        Err(_) => return (pair, None),
                    },
                };
                if token.is_cancelled() {
                    return (pair, None);
                }

                let measured = tokio::select! {
                    _ = token.cancelled() => None,
                    r = measure_pair(runner.as_ref(), &namespace, &settings, pair, &source, &destination) => Some(r),
                };
                if matches!(measured, Some(Err(_))) {
                    token.cancel();
                }
                (pair, measured)
            });
        }

        let mut scan = PairwiseScan::default();
        let mut failures: Vec<(PairIndex, NetdiagError)> = Vec::new();
        let mut worker_failure = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Some(Ok(result)))) => scan.results.push(result),
                Ok((pair, Some(Err(e)))) => failures.push((pair, e)),
                Ok((pair, None)) => debug!("Pair {:?} skipped after cancellation", pair),
                Err(e) => {
                    token.cancel();
                    worker_failure.get_or_insert_with(|| {
                        NetdiagError::execution("bandwidth-worker", format!("worker task failed: {}", e))
                    });
                }
            }
        }

        scan.results.sort_by_key(|r| r.pair);
        failures.sort_by_key(|(pair, _)| *pair);
        scan.failure = failures.into_iter().next().map(|(_, e)| e).or(worker_failure);
        scan
    }
}

/// Address iperf3 is bound to inside a host-network pod
async fn read_bind_addr(
    runner: &dyn RemoteRunner,
    namespace: &str,
    settings: &ProbeSettings,
    instance: &ProbeInstance,
) -> Result<String> {
    let output = runner
        .run_command(&instance.name, namespace, &format!("cat {}", settings.bind_addr_file))
        .await
        .map_err(|e| e.with_hint(format!("Get pod {} iperf ip: {}", instance.name, HOST_NETWORK_HINT)))?;

    let addr = output.trim();
    if addr.is_empty() {
        return Err(NetdiagError::execution(
            &instance.name,
            format!("{} is empty", settings.bind_addr_file),
        )
        .with_hint(HOST_NETWORK_HINT));
    }
    if let (Some(network), Ok(ip)) = (&settings.data_network, addr.parse::<IpAddr>()) {
        if !network.contains(&ip) {
            warn!(
                "Pod {} bound iperf3 to {}, outside data network {}",
                instance.name, ip, network
            );
        }
    }
    Ok(addr.to_string())
}

async fn measure_pair(
    runner: &dyn RemoteRunner,
    namespace: &str,
    settings: &ProbeSettings,
    pair: PairIndex,
    source: &ProbeInstance,
    destination: &ProbeInstance,
) -> Result<CheckResult> {
    let source_ip = read_bind_addr(runner, namespace, settings, source).await?;
    let destination_ip = read_bind_addr(runner, namespace, settings, destination).await?;

    let command = client_command(&destination_ip, settings.port, settings.iperf_duration_secs);
    debug!("{}: {}", source.name, command);
    let output = runner
        .run_command(&source.name, namespace, &command)
        .await
        .map_err(|e| unreachable(&source.name, &destination.name, e, HOST_NETWORK_HINT))?;

    let bandwidth_mb = match parse_sender_throughput(&output) {
        Some(mb) => mb,
        None => match settings.parse_policy {
            ParsePolicy::Strict => {
                return Err(NetdiagError::parse(
                    &source.name,
                    "no sender throughput line in iperf3 output",
                    output.trim(),
                ))
            }
            ParsePolicy::Lenient => {
                warn!(
                    "Could not parse iperf3 output from {} -> {}, recording 0 MB/s",
                    source.name, destination.name
                );
                0.0
            }
        },
    };

    Ok(CheckResult {
        pair,
        source_ip,
        destination_ip,
        bandwidth_mb,
    })
}
